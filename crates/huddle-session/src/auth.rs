//! Authentication hook for validating caller identity.
//!
//! Token issuance, password hashing and the user database all live
//! elsewhere. Huddle only needs one question answered: "who does this
//! token belong to?" The [`Authenticator`] trait is that question.

use std::collections::HashMap;
use std::future::Future;

use huddle_protocol::Identity;
use tracing::debug;

use crate::SessionError;

/// Validates a caller's token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use huddle_protocol::Identity;
/// use huddle_session::{Authenticator, SessionError};
///
/// /// Accepts any token and uses it as both id and name.
/// struct EchoAuthenticator;
///
/// impl Authenticator for EchoAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::MissingToken);
///         }
///         Ok(Identity::new(token, token))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the caller's id and display name
    /// - `Err(SessionError::AuthFailed)`: the token is invalid or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// An [`Authenticator`] backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token (builder style).
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.insert(token, identity);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, identity: Identity) {
        self.tokens.insert(token.into(), identity);
    }

    /// Parses a `TOKEN=ID:NAME` entry, as accepted on the command line.
    ///
    /// The name may itself contain `:`; only the first one splits.
    ///
    /// # Errors
    /// `SessionError::InvalidEntry` if the entry has no `=`, no `:`, or an
    /// empty token or id.
    pub fn parse_entry(entry: &str) -> Result<(String, Identity), SessionError> {
        let invalid = || SessionError::InvalidEntry(entry.to_string());

        let (token, rest) = entry.split_once('=').ok_or_else(invalid)?;
        let (id, name) = rest.split_once(':').ok_or_else(invalid)?;
        if token.is_empty() || id.is_empty() {
            return Err(invalid());
        }

        Ok((token.to_string(), Identity::new(id, name)))
    }

    /// Builds a table from `TOKEN=ID:NAME` entries.
    ///
    /// # Errors
    /// The first entry that fails [`parse_entry`](Self::parse_entry).
    pub fn from_entries<I, S>(entries: I) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut auth = Self::new();
        for entry in entries {
            let (token, identity) = Self::parse_entry(entry.as_ref())?;
            auth.insert(token, identity);
        }
        Ok(auth)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }
        match self.tokens.get(token) {
            Some(identity) => Ok(identity.clone()),
            None => {
                debug!("rejected unknown token");
                Err(SessionError::AuthFailed("unknown token".into()))
            }
        }
    }
}
