//! Per-connection handler: upgrade, authenticate, join, then pump.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Screen the upgrade request → route (room kind + id) and token
//!   2. Authenticate the token → identity
//!   3. Join the room → admission and outbound queue
//!   4. Run the read and write pumps until the connection ends

use std::sync::Arc;

use huddle_protocol::{Codec, Identity, ServerFrame};
use huddle_room::{ChatStore, RoomKind};
use huddle_session::Authenticator;
use huddle_transport::{CloseReason, FrameWriter, PendingUpgrade};
use tracing::{debug, info, warn};

use crate::pump::{MemberLink, PumpSettings, run_pumps, within};
use crate::route::{self, Route};
use crate::server::ServerState;
use crate::HuddleError;

/// Display name given to game players who connect without a token.
const ANONYMOUS_NAME: &str = "player";

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    pending: PendingUpgrade,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), HuddleError>
where
    A: Authenticator,
    S: ChatStore,
    C: Codec + Clone,
{
    let conn_id = pending.id();
    let peer = pending.peer_addr();
    let allow_anonymous_game = state.config.allow_anonymous_game;

    let (route, conn) = pending
        .upgrade(move |request| route::screen(request, allow_anonymous_game))
        .await?;
    let Route {
        kind,
        room_id,
        token,
    } = route;
    let (reader, mut writer) = conn.split();

    // --- Step 2: Authenticate ---
    let identity = match token {
        Some(token) => match state.auth.authenticate(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                debug!(%conn_id, %room_id, error = %e, "authentication failed");
                let err = HuddleError::from(e);
                refuse(&mut writer, &state, &err, "unauthorized").await;
                return Err(err);
            }
        },
        None => Identity::new(conn_id.to_string(), ANONYMOUS_NAME),
    };

    // --- Step 3: Join ---
    let joined = match kind {
        RoomKind::Chat => state.chat.join(&room_id, identity.clone()).await,
        RoomKind::Game => state.game.join(&room_id, identity.clone()).await,
    };
    let (room, admission, queue) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            info!(%conn_id, %room_id, client_id = %identity.id, error = %e, "join refused");
            let err = HuddleError::from(e);
            refuse(&mut writer, &state, &err, &err.to_string()).await;
            return Err(err);
        }
    };

    let client_id = identity.id;
    info!(
        %conn_id,
        %peer,
        %kind,
        %room_id,
        %client_id,
        ticket = %admission.ticket,
        slot = ?admission.slot,
        "client connected"
    );

    // --- Step 4: Pump ---
    let link = MemberLink {
        room,
        client_id: client_id.clone(),
        ticket: admission.ticket,
    };
    let settings = PumpSettings {
        keepalive: state.config.keepalive,
        max_frame_bytes: state.config.max_frame_bytes,
    };
    run_pumps(reader, writer, queue, link, state.codec.clone(), settings).await;

    info!(%conn_id, %room_id, %client_id, "client disconnected");
    Ok(())
}

/// Sends an error frame and closes the connection with a policy close.
async fn refuse<W, A, S, C>(
    writer: &mut W,
    state: &ServerState<A, S, C>,
    err: &HuddleError,
    message: &str,
) where
    W: FrameWriter,
    A: Authenticator,
    S: ChatStore,
    C: Codec,
{
    let write_wait = state.config.keepalive.write_wait;
    let frame = ServerFrame::Error {
        code: err.status(),
        message: message.to_string(),
    };
    match state.codec.encode(&frame) {
        Ok(bytes) => {
            if let Err(e) = within(write_wait, writer.send(bytes)).await {
                debug!(error = %e, "error frame not delivered");
            }
        }
        Err(e) => warn!(error = %e, "error frame could not be encoded"),
    }
    let _ = within(write_wait, writer.close(CloseReason::Policy(message.to_string()))).await;
}
