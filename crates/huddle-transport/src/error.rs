/// Errors that can occur in the transport layer.
///
/// Every variant is fatal to the connection it came from. Nothing in
/// the transport layer is retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The HTTP upgrade was refused, either by the screening callback or
    /// because the request was not a valid WebSocket handshake.
    #[error("upgrade rejected: {0}")]
    UpgradeRejected(String),
}
