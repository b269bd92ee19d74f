//! Chat log persistence hook.
//!
//! Rooms keep their chat log in memory. A [`ChatStore`] lets the log
//! outlive the room: the actor loads it when the room starts and appends
//! every new message. Both calls are best-effort; a failing store is
//! logged and the room carries on with what it has in memory.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use huddle_protocol::{ChatMessage, RoomId};

use crate::StoreError;

/// Loads and appends a room's chat log.
///
/// `Send + Sync + 'static` because one store is shared by every room actor.
pub trait ChatStore: Send + Sync + 'static {
    /// Returns the persisted log for `room_id`, oldest first.
    fn load(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    /// Appends one message to the log for `room_id`.
    fn append(
        &self,
        room_id: &RoomId,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A store that remembers nothing. Rooms start empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChatStore;

impl ChatStore for NoopChatStore {
    async fn load(&self, _room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(Vec::new())
    }

    async fn append(&self, _room_id: &RoomId, _message: &ChatMessage) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A process-local store. Logs survive room reclamation but not a restart.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryChatStore {
    logs: Arc<Mutex<HashMap<RoomId, Vec<ChatMessage>>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the log for a room, replacing what was there.
    pub fn seed(&self, room_id: RoomId, messages: Vec<ChatMessage>) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.insert(room_id, messages);
        }
    }

    /// A copy of the stored log for `room_id`.
    pub fn messages(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.logs
            .lock()
            .map(|logs| logs.get(room_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl ChatStore for MemoryChatStore {
    async fn load(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        let logs = self
            .logs
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(logs.get(room_id).cloned().unwrap_or_default())
    }

    async fn append(&self, room_id: &RoomId, message: &ChatMessage) -> Result<(), StoreError> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        logs.entry(room_id.clone()).or_default().push(message.clone());
        Ok(())
    }
}
