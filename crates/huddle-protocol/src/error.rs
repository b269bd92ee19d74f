//! Error types for the protocol layer.
//!
//! A `ProtocolError` always concerns a single frame. The connection that
//! produced it stays open; the frame is discarded.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing `type` tag,
    /// or a body that does not match its tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The `type` tag is not one this server understands.
    #[error("unknown frame type: {0:?}")]
    UnknownType(String),

    /// The frame parsed but breaks a protocol rule, e.g. a signaling
    /// frame that names no signal kind.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
