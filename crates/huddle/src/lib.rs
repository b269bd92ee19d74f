//! # Huddle
//!
//! A realtime room router. Clients connect over WebSockets to a named
//! room and exchange chat, WebRTC signaling or two-player game input with
//! the other members of that room.
//!
//! - `/ws/{room}`: chat and signaling. Requires a `token` query parameter.
//! - `/game/{room}`: the bullet game, two players per room.
//!
//! Every room is a single actor task. Connections never touch room state
//! directly; they send commands to the actor and read frames from their
//! own bounded queue.
//!
//! ```text
//! Transport (WebSocket) → Protocol (frames) → Session (identity)
//!     → Room actor (chat, signaling, game) → outbound queues
//! ```
//!
//! See [`HuddleServer`] to get started.

mod config;
mod error;
mod handler;
pub mod logging;
mod pump;
mod route;
mod server;

pub use config::{KeepaliveConfig, ServerConfig};
pub use error::HuddleError;
pub use route::Route;
pub use server::{HuddleServer, HuddleServerBuilder};

/// Everything needed to embed a server or write a client test.
pub mod prelude {
    pub use crate::{HuddleError, HuddleServer, HuddleServerBuilder, KeepaliveConfig, ServerConfig};
    pub use huddle_protocol::{
        ChatMessage, ClientFrame, ClientId, Codec, Identity, JsonCodec, Member, PlayerSlot, Point,
        ProtocolError, RoomId, ServerFrame, SignalKind,
    };
    pub use huddle_room::{
        ChatStore, GameConfig, MemoryChatStore, NoopChatStore, RoomConfig, RoomError, RoomInfo,
        RoomKind, RoomRegistry, StoreError,
    };
    pub use huddle_session::{Authenticator, SessionError, StaticAuthenticator};
}
