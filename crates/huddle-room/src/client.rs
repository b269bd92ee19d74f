//! A member's side of the room: identity plus its bounded outbound queue.

use std::fmt;
use std::sync::Arc;

use huddle_protocol::{ClientId, Identity, Member, PlayerSlot, ServerFrame};
use tokio::sync::mpsc;

/// One item on a member's outbound queue. Broadcasts share one allocation.
pub type Outbound = Arc<ServerFrame>;

/// Distinguishes successive connections that share a client id.
///
/// Issued by the room on admission. Commands carrying a stale ticket are
/// ignored, so a replaced connection cannot unregister its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a successful registration returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub ticket: Ticket,
    /// Assigned paddle, game rooms only.
    pub slot: Option<PlayerSlot>,
}

/// The room's end of a member: who they are and where to send frames.
///
/// Moved into the room on registration. The room holds the only sender,
/// so dropping this handle is what closes the member's queue.
#[derive(Debug)]
pub struct ClientHandle {
    identity: Identity,
    sender: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    /// Creates a handle and the queue its frames arrive on.
    pub fn new(identity: Identity, capacity: usize) -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { identity, sender }, OutboundQueue { receiver })
    }

    pub fn id(&self) -> &ClientId {
        &self.identity.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn member(&self) -> Member {
        Member::from(&self.identity)
    }

    /// Non-blocking enqueue. Fails when the queue is full or its reader
    /// has gone away.
    pub(crate) fn try_deliver(&self, frame: Outbound) -> Result<(), mpsc::error::TrySendError<Outbound>> {
        self.sender.try_send(frame)
    }
}

/// The connection's end of a member: frames the room wants written.
///
/// `recv` returns `None` once the room has dropped the member, after every
/// frame queued before that has been taken.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::Receiver<Outbound>,
}

impl OutboundQueue {
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.receiver.recv().await
    }

    /// Takes a queued frame without waiting. `None` if nothing is queued
    /// right now or the queue is closed.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.receiver.try_recv().ok()
    }

    /// Whether the room has dropped this member and nothing is left to read.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed() && self.receiver.is_empty()
    }
}
