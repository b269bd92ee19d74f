//! Error types for the room layer.

use huddle_protocol::{ClientId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id is registered.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Game rooms hold two players at most.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The client is not a member of this room.
    #[error("client {0} not in room {1}")]
    NotInRoom(ClientId, RoomId),

    /// The room's mailbox is closed: the actor stopped or the room was
    /// reclaimed. Resolving the id again yields a fresh room.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The HTTP-style status reported to the client for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::NotInRoom(..) => 404,
            Self::RoomFull(_) => 409,
            Self::Unavailable(_) => 503,
        }
    }
}

/// Errors reported by a [`ChatStore`](crate::ChatStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chat store unavailable: {0}")]
    Unavailable(String),

    #[error("chat store rejected the write: {0}")]
    Rejected(String),
}
