//! Unified error type for the Huddle server.

use huddle_protocol::ProtocolError;
use huddle_room::RoomError;
use huddle_session::SessionError;
use huddle_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` conversions let `?` lift a sub-crate error into this
/// one, so connection handlers deal with a single type.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// Binding, upgrading, reading or writing a connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The caller could not be authenticated.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The room refused or lost the client.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl HuddleError {
    /// The status code reported to a client refused for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport(_) => 500,
            Self::Protocol(_) => 400,
            Self::Session(e) => e.status(),
            Self::Room(e) => e.status(),
        }
    }
}
