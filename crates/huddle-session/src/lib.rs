//! Caller identity for Huddle.
//!
//! Huddle never issues or verifies credentials on its own. A connection
//! arrives with a bearer token; an [`Authenticator`] turns that token into
//! an [`Identity`](huddle_protocol::Identity) (an opaque id plus a display
//! name) or refuses it.
//!
//! ```text
//! Server (above)  ← calls authenticate() right after the upgrade
//!     ↕
//! Session Layer (this crate)  ← token → Identity
//!     ↕
//! Protocol Layer (below)  ← provides Identity, ClientId
//! ```
//!
//! [`StaticAuthenticator`] is a fixed token table, enough for local
//! development and for tests.

mod auth;
mod error;

pub use auth::{Authenticator, StaticAuthenticator};
pub use error::SessionError;
