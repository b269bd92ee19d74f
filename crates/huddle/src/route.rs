//! Upgrade screening: which room a request is for, and whether it may in.

use huddle_protocol::RoomId;
use huddle_room::RoomKind;
use huddle_transport::{HandshakeRequest, Rejection};
use serde::Deserialize;

/// Where an accepted upgrade is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: RoomKind,
    pub room_id: RoomId,
    /// The `token` query parameter, if one was given.
    pub token: Option<String>,
}

/// Query parameters read off the upgrade request.
#[derive(Debug, Deserialize)]
struct ConnectQuery {
    token: Option<String>,
}

/// Maps a request path to a room.
///
/// `/ws/{id}` is a chat room and `/game/{id}` a game room. Any other path
/// is a 404. An empty id, or one with further path segments, is a 400.
pub fn parse_path(path: &str) -> Result<(RoomKind, RoomId), Rejection> {
    let (kind, rest) = if let Some(rest) = path.strip_prefix("/ws/") {
        (RoomKind::Chat, rest)
    } else if let Some(rest) = path.strip_prefix("/game/") {
        (RoomKind::Game, rest)
    } else {
        return Err(Rejection::new(404, "not found"));
    };

    if rest.is_empty() || rest.contains('/') {
        return Err(Rejection::new(400, "invalid room id"));
    }
    Ok((kind, RoomId::new(rest)))
}

/// Decides an upgrade request before the handshake completes.
///
/// Chat routes always need a token. Game routes need one unless
/// `allow_anonymous_game` is set. The token itself is only checked after
/// the upgrade.
pub fn screen(request: &HandshakeRequest, allow_anonymous_game: bool) -> Result<Route, Rejection> {
    let (kind, room_id) = parse_path(&request.path)?;
    let ConnectQuery { token } = request.query()?;
    let token = token.filter(|t| !t.is_empty());

    let anonymous_ok = kind == RoomKind::Game && allow_anonymous_game;
    if token.is_none() && !anonymous_ok {
        return Err(Rejection::new(401, "token required"));
    }

    Ok(Route {
        kind,
        room_id,
        token,
    })
}
