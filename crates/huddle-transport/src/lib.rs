//! Transport layer for Huddle.
//!
//! A client connection is a message-framed, full-duplex WebSocket that
//! starts life as an HTTP upgrade request. This crate owns three things:
//!
//! - **Upgrade screening**: the request path and query are handed to a
//!   caller-supplied callback *before* the upgrade completes, so bad
//!   routes and missing credentials can be refused with a plain HTTP
//!   status ([`HandshakeRequest`], [`Rejection`]).
//! - **Split halves**: once upgraded, a connection is split into one
//!   [`FrameReader`] and one [`FrameWriter`]. Each half is owned by exactly
//!   one task; they never share a lock.
//! - **An in-memory pair** ([`memory`]) implementing the same traits, so
//!   the code that drives the halves can be exercised without sockets.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingUpgrade, WebSocketConnection, WebSocketReader, WebSocketTransport,
    WebSocketWriter,
};

use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Upgrade screening
// ---------------------------------------------------------------------------

/// The parts of an HTTP upgrade request the server routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request path, e.g. `/ws/lobby`.
    pub path: String,
    /// Raw query string without the leading `?`, if any.
    pub query: Option<String>,
}

impl HandshakeRequest {
    /// Deserializes the query string into `T`.
    ///
    /// Keys and values are percent-decoded. A missing query is read as an
    /// empty one. A query that does not fit `T` is a 400.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, Rejection> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or_default())
            .map_err(|e| Rejection::new(400, format!("invalid query: {e}")))
    }
}

/// A refused upgrade: the HTTP status and body sent back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub reason: String,
}

impl Rejection {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Frames and halves
// ---------------------------------------------------------------------------

/// One inbound frame, as seen by the read half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text or binary data frame.
    Data(Vec<u8>),
    /// A keepalive response to one of our pings.
    Pong,
}

/// Why the write half is closing the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Orderly shutdown (queue closed, client evicted).
    Normal,
    /// The peer broke a rule (failed auth, room full).
    Policy(String),
}

/// The read half of a connection. Owned by exactly one task.
pub trait FrameReader: Send + 'static {
    /// Waits for the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;
}

/// The write half of a connection. Owned by exactly one task.
pub trait FrameWriter: Send + 'static {
    /// Writes one data frame. Valid UTF-8 goes out as a text frame.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Writes a keepalive probe.
    fn ping(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Writes a close frame and shuts the write side down.
    fn close(
        &mut self,
        reason: CloseReason,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
