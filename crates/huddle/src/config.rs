//! Server configuration.

use std::time::Duration;

use huddle_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Keepalive and deadline settings for every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// How long the read half waits for any frame (data or pong) before
    /// giving up on the peer.
    pub pong_wait: Duration,
    /// How often the write half sends a ping. Must be below `pong_wait`.
    pub ping_period: Duration,
    /// Deadline for a single write.
    pub write_wait: Duration,
}

impl KeepaliveConfig {
    /// Settings with the given read deadline and a ping period of 9/10 of it.
    pub fn with_pong_wait(pong_wait: Duration) -> Self {
        Self {
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            ..Self::default()
        }
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// Everything the server needs besides its authenticator and chat store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub keepalive: KeepaliveConfig,
    /// Inbound frames larger than this are discarded unread.
    pub max_frame_bytes: usize,
    /// Whether `/game/{id}` accepts connections without a token.
    pub allow_anonymous_game: bool,
    pub chat_room: RoomConfig,
    pub game_room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            keepalive: KeepaliveConfig::default(),
            max_frame_bytes: 64 * 1024,
            allow_anonymous_game: true,
            chat_room: RoomConfig::default(),
            game_room: RoomConfig::default(),
        }
    }
}
