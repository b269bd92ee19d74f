//! `HuddleServer` builder and accept loop.
//!
//! This is the entry point for running a Huddle server. It ties the
//! layers together: transport → protocol → session → room.

use std::sync::Arc;

use huddle_protocol::{Codec, JsonCodec};
use huddle_room::{ChatStore, NoopChatStore, RoomConfig, RoomKind, RoomRegistry};
use huddle_session::Authenticator;
use huddle_transport::WebSocketTransport;

use crate::handler::handle_connection;
use crate::{HuddleError, KeepaliveConfig, ServerConfig};

/// Shared server state passed to each connection task.
///
/// Chat and game rooms live in separate registries, so `/ws/x` and
/// `/game/x` are different rooms. Only chat rooms persist their log.
pub(crate) struct ServerState<A: Authenticator, S: ChatStore, C: Codec> {
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    pub(crate) chat: RoomRegistry<S>,
    pub(crate) game: RoomRegistry<NoopChatStore>,
}

/// Builder for configuring and starting a Huddle server.
///
/// # Example
///
/// ```rust,ignore
/// use huddle::prelude::*;
///
/// let auth = StaticAuthenticator::new()
///     .with_token("t1", Identity::new("u-1", "Alice"));
/// let server = HuddleServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(auth, MemoryChatStore::new())
///     .await?;
/// server.run().await
/// ```
pub struct HuddleServerBuilder {
    config: ServerConfig,
}

impl HuddleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.config.keepalive = keepalive;
        self
    }

    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.config.max_frame_bytes = bytes;
        self
    }

    /// Whether game routes accept connections that carry no token.
    pub fn allow_anonymous_game(mut self, allow: bool) -> Self {
        self.config.allow_anonymous_game = allow;
        self
    }

    pub fn chat_room(mut self, config: RoomConfig) -> Self {
        self.config.chat_room = config;
        self
    }

    pub fn game_room(mut self, config: RoomConfig) -> Self {
        self.config.game_room = config;
        self
    }

    /// Replaces the whole configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and sets up the room registries.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`. `store` backs chat
    /// rooms only.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: S,
    ) -> Result<HuddleServer<A, S, JsonCodec>, HuddleError>
    where
        A: Authenticator,
        S: ChatStore,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let chat = RoomRegistry::new(RoomKind::Chat, self.config.chat_room.clone(), store);
        let game = RoomRegistry::new(RoomKind::Game, self.config.game_room.clone(), NoopChatStore);

        let state = Arc::new(ServerState {
            auth,
            codec: JsonCodec,
            config: self.config,
            chat,
            game,
        });

        Ok(HuddleServer { transport, state })
    }
}

impl Default for HuddleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Huddle server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HuddleServer<A: Authenticator, S: ChatStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
}

impl<A, S, C> HuddleServer<A, S, C>
where
    A: Authenticator,
    S: ChatStore,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// The chat room registry. Clones share the live rooms.
    pub fn chat_rooms(&self) -> RoomRegistry<S> {
        self.state.chat.clone()
    }

    /// The game room registry. Clones share the live rooms.
    pub fn game_rooms(&self) -> RoomRegistry<NoopChatStore> {
        self.state.game.clone()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection gets its own task, which performs the
    /// upgrade, so a slow handshake never stalls accepting. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), HuddleError> {
        tracing::info!(addr = %self.state.config.bind_addr, "Huddle server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn_id = pending.id();
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(%conn_id, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
