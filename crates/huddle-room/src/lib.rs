//! Rooms for Huddle.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! members, chat log and game state. Connections reach it through a
//! [`RoomHandle`] and hear back on their own bounded [`OutboundQueue`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms on first use, forgets them when empty
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`ClientHandle`] / [`OutboundQueue`]: the two ends of a member
//! - [`ChatStore`]: where chat logs are loaded from and appended to
//! - [`BulletBoard`] / [`step`]: the game simulation
//!
//! # Delivery
//!
//! The actor never waits on a member. Every frame is offered to the
//! member's queue without blocking; a member whose queue is full (or whose
//! connection is gone) is evicted as if it had left.

mod client;
mod config;
mod error;
pub mod game;
mod registry;
mod room;
mod store;

pub use client::{Admission, ClientHandle, Outbound, OutboundQueue, Ticket};
pub use config::{Arena, GameConfig, RoomConfig, RoomKind};
pub use error::{RoomError, StoreError};
pub use game::{BulletBoard, Paddles, SimEvent, step};
pub use registry::RoomRegistry;
pub use room::{RoomHandle, RoomInfo};
pub use store::{ChatStore, MemoryChatStore, NoopChatStore};
pub use huddle_tick::{OverrunPolicy, TickConfig};
