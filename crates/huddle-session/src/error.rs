//! Error types for the session layer.

/// Errors that can occur while establishing who a caller is.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The request carried no token at all.
    #[error("missing token")]
    MissingToken,

    /// A `TOKEN=ID:NAME` table entry could not be parsed.
    #[error("invalid token entry {0:?}: expected TOKEN=ID:NAME")]
    InvalidEntry(String),
}

impl SessionError {
    /// The HTTP-style status reported to the client for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::AuthFailed(_) | Self::MissingToken => 401,
            Self::InvalidEntry(_) => 400,
        }
    }
}
