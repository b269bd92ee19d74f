//! In-memory connection halves backed by Tokio channels.
//!
//! [`pair`] returns a [`MemoryReader`]/[`MemoryWriter`] pair that behaves
//! like an upgraded connection, plus a [`MemoryPeer`] playing the remote
//! client: it injects inbound frames and observes everything written.

use tokio::sync::mpsc;

use crate::{CloseReason, Frame, FrameReader, FrameWriter, TransportError};

/// Something the write half put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    Data(Vec<u8>),
    Ping,
    Close(CloseReason),
}

impl Written {
    /// Returns the data frame as UTF-8 text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Data(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }
}

type Inbound = Result<Frame, TransportError>;

/// Creates a connected reader/writer pair and the peer that drives it.
pub fn pair() -> (MemoryReader, MemoryWriter, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    (
        MemoryReader { inbound: inbound_rx },
        MemoryWriter {
            written: written_tx,
            closed: false,
        },
        MemoryPeer {
            inbound: Some(inbound_tx),
            written: written_rx,
        },
    )
}

/// Read half. Ends with `Ok(None)` once the peer hangs up.
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl FrameReader for MemoryReader {
    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Write half. Fails once the peer is dropped or after `close`.
pub struct MemoryWriter {
    written: mpsc::UnboundedSender<Written>,
    closed: bool,
}

impl MemoryWriter {
    fn push(&mut self, item: Written) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed(
                "write half already closed".into(),
            ));
        }
        self.written.send(item).map_err(|_| {
            TransportError::ConnectionClosed("peer went away".into())
        })
    }
}

impl FrameWriter for MemoryWriter {
    async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(Written::Data(data))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.push(Written::Ping)
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let result = self.push(Written::Close(reason));
        self.closed = true;
        result
    }
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    written: mpsc::UnboundedReceiver<Written>,
}

impl MemoryPeer {
    /// Sends a text frame to the reader.
    pub fn send_text(&self, text: &str) {
        self.push(Ok(Frame::Data(text.as_bytes().to_vec())));
    }

    /// Answers a keepalive probe.
    pub fn send_pong(&self) {
        self.push(Ok(Frame::Pong));
    }

    /// Makes the reader's next call fail with a transport error.
    pub fn fail_read(&self, reason: &str) {
        self.push(Err(TransportError::ConnectionClosed(reason.into())));
    }

    /// Closes the inbound direction; the reader sees a clean close.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Waits for the next thing the writer produced.
    ///
    /// Returns `None` once the writer is dropped.
    pub async fn next_written(&mut self) -> Option<Written> {
        self.written.recv().await
    }

    /// Returns the next written item if one is already queued.
    pub fn try_next_written(&mut self) -> Option<Written> {
        self.written.try_recv().ok()
    }

    fn push(&self, item: Inbound) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(item);
        }
    }
}
