//! Room registry: one live actor per room id, created on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use huddle_protocol::{Identity, RoomId};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::{Admission, ClientHandle, OutboundQueue};
use crate::room::spawn_room;
use crate::{ChatStore, RoomConfig, RoomError, RoomHandle, RoomKind};

/// How many times [`RoomRegistry::join`] re-resolves a room that was
/// reclaimed between lookup and registration.
const JOIN_ATTEMPTS: usize = 3;

/// State shared between the registry and the actors it spawned.
pub(crate) struct Shared<S: ChatStore> {
    kind: RoomKind,
    config: RoomConfig,
    store: Arc<S>,
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    next_generation: AtomicU64,
}

impl<S: ChatStore> Shared<S> {
    /// Removes the entry for `room_id` if it still belongs to `generation`
    /// and has no members. Called by the room actor itself.
    pub(crate) async fn release_if_empty(&self, room_id: &RoomId, generation: u64) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(room_id) else {
            return false;
        };
        if handle.generation() != generation || handle.member_count() != 0 {
            return false;
        }
        rooms.remove(room_id);
        info!(%room_id, kind = %self.kind, generation, rooms = rooms.len(), "room reclaimed");
        true
    }
}

/// Tracks every live room of one kind.
///
/// Cheap to clone; clones share the same rooms. Rooms are created lazily
/// by [`resolve`](Self::resolve) and remove themselves once their last
/// member leaves.
pub struct RoomRegistry<S: ChatStore> {
    shared: Arc<Shared<S>>,
}

impl<S: ChatStore> Clone for RoomRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: ChatStore> RoomRegistry<S> {
    pub fn new(kind: RoomKind, config: RoomConfig, store: S) -> Self {
        Self::with_store(kind, config, Arc::new(store))
    }

    /// Like [`new`](Self::new), sharing a store with other registries.
    pub fn with_store(kind: RoomKind, config: RoomConfig, store: Arc<S>) -> Self {
        Self {
            shared: Arc::new(Shared {
                kind,
                config,
                store,
                rooms: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn kind(&self) -> RoomKind {
        self.shared.kind
    }

    pub fn config(&self) -> &RoomConfig {
        &self.shared.config
    }

    /// Returns the actor for `room_id`, starting one if none is running.
    ///
    /// Concurrent callers resolving the same new id all get the same
    /// actor: the read-locked lookup is repeated under the write lock
    /// before anything is created.
    pub async fn resolve(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.live(&*self.shared.rooms.read().await, room_id) {
            return handle;
        }

        let mut rooms = self.shared.rooms.write().await;
        if let Some(handle) = self.live(&rooms, room_id) {
            return handle;
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_room(
            room_id.clone(),
            self.shared.kind,
            generation,
            &self.shared.config,
            self.shared.store.clone(),
            Arc::downgrade(&self.shared),
        );
        rooms.insert(room_id.clone(), handle.clone());
        info!(%room_id, kind = %self.shared.kind, generation, rooms = rooms.len(), "room created");
        handle
    }

    /// Resolves `room_id` and registers `identity` in it.
    ///
    /// Returns the room, the admission and the queue the member's frames
    /// will arrive on. A room reclaimed between lookup and registration is
    /// resolved again, a bounded number of times.
    ///
    /// # Errors
    /// - `RoomError::RoomFull` from a full game room.
    /// - `RoomError::Unavailable` if every attempt met a closing room.
    pub async fn join(
        &self,
        room_id: &RoomId,
        identity: Identity,
    ) -> Result<(RoomHandle, Admission, OutboundQueue), RoomError> {
        let capacity = self.shared.config.outbound_capacity;
        for attempt in 1..=JOIN_ATTEMPTS {
            let room = self.resolve(room_id).await;
            let (client, queue) = ClientHandle::new(identity.clone(), capacity);
            match room.register(client).await {
                Ok(admission) => return Ok((room, admission, queue)),
                Err(RoomError::Unavailable(_)) => {
                    debug!(%room_id, attempt, "room closed during join, resolving again");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RoomError::Unavailable(room_id.clone()))
    }

    /// The live actor for `room_id`, without creating one.
    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.live(&*self.shared.rooms.read().await, room_id)
    }

    pub async fn room_count(&self) -> usize {
        self.shared.rooms.read().await.len()
    }

    /// Rooms whose actor stopped without reclaiming themselves are treated
    /// as absent, so the next resolve replaces them.
    fn live(&self, rooms: &HashMap<RoomId, RoomHandle>, room_id: &RoomId) -> Option<RoomHandle> {
        rooms.get(room_id).filter(|handle| !handle.is_closed()).cloned()
    }
}
