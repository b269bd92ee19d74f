//! Room configuration.

use std::fmt;
use std::time::Duration;

use huddle_protocol::Point;
use huddle_tick::TickConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomKind
// ---------------------------------------------------------------------------

/// Which event set a room handles.
///
/// Both kinds share registration, chat and signaling. Game rooms add
/// paddles and bullets, cap membership at two, and run a simulation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Chat,
    Game,
}

impl RoomKind {
    /// Maximum members, or `None` for uncapped.
    pub fn capacity(self) -> Option<usize> {
        match self {
            Self::Chat => None,
            Self::Game => Some(2),
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Game => write!(f, "game"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Per-room settings, shared by every room of a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Capacity of each member's outbound queue. A member whose queue is
    /// full when the room delivers to it is evicted.
    pub outbound_capacity: usize,

    /// Capacity of the room actor's mailbox.
    pub mailbox_capacity: usize,

    /// Simulation settings (game rooms only).
    pub game: GameConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            mailbox_capacity: 64,
            game: GameConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Vertical play bounds. Bullets leaving them are removed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub min_y: f64,
    pub max_y: f64,
}

/// Settings for the game variant and its simulation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Simulation clock: period, overrun policy and work budget.
    pub tick: TickConfig,
    /// Distance a bullet travels per tick.
    pub bullet_speed: f64,
    /// Half-width of the square hit box around a paddle.
    pub hit_radius: f64,
    pub arena: Arena,
    pub ball: Point,
    /// Starting paddle position for slot 1 (bottom).
    pub player1: Point,
    /// Starting paddle position for slot 2 (top).
    pub player2: Point,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::every(Duration::from_millis(30)),
            bullet_speed: 5.0,
            hit_radius: 50.0,
            arena: Arena {
                min_y: 50.0,
                max_y: 500.0,
            },
            ball: Point::new(50.0, 250.0),
            player1: Point::new(100.0, 500.0),
            player2: Point::new(100.0, 50.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_tick::OverrunPolicy;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.game.tick.period, Duration::from_millis(30));
        assert_eq!(config.game.tick.policy, OverrunPolicy::Skip);
    }

    #[test]
    fn test_room_kind_capacity() {
        assert_eq!(RoomKind::Chat.capacity(), None);
        assert_eq!(RoomKind::Game.capacity(), Some(2));
    }

    #[test]
    fn test_room_kind_display() {
        assert_eq!(RoomKind::Chat.to_string(), "chat");
        assert_eq!(RoomKind::Game.to_string(), "game");
    }

    #[test]
    fn test_game_config_starting_positions() {
        let game = GameConfig::default();
        assert_eq!(game.player1, Point::new(100.0, 500.0));
        assert_eq!(game.player2, Point::new(100.0, 50.0));
        assert!(game.arena.min_y < game.arena.max_y);
    }
}
