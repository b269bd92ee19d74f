//! Wire protocol for Huddle.
//!
//! This crate defines what travels between a client and its room:
//!
//! - **Identifiers** ([`RoomId`], [`ClientId`], [`Identity`]): who and where.
//! - **Frames** ([`ClientFrame`] inbound, [`ServerFrame`] outbound): JSON
//!   objects carrying a mandatory `type` discriminator.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, typed values out.
//! - **Errors** ([`ProtocolError`]): a frame that cannot be understood.
//!
//! Inbound frames are decoded in two steps (see [`decode_client_frame`]):
//! the `type` tag first, then the body for that tag. This keeps "unknown
//! type" distinguishable from "known type, bad body" in the logs.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientFrame) → Room actor (events)
//! ```

mod codec;
mod error;
mod frame;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::{ClientFrame, ServerFrame, decode_client_frame};
pub use types::{
    Bullet, BulletId, ChatMessage, ClientId, GameSnapshot, GameView,
    Identity, Member, PlayerSlot, Point, RoomId, SignalFrame, SignalKind,
};
