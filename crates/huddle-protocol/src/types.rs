//! Core value types shared by frames and rooms.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room identifier, supplied by the caller in the connection path.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A client identifier: the verified caller id, or a connection-scoped
/// id for anonymous game players.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Who a connection belongs to, as established by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: ClientId,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(id),
            display_name: display_name.into(),
        }
    }
}

/// A room member as other members see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
}

impl From<&Identity> for Member {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.display_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat and signaling
// ---------------------------------------------------------------------------

/// One entry in a room's chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: ClientId,
    pub name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// The WebRTC negotiation step a signaling frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    /// Free-form text riding the signaling channel.
    Chat,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Chat => "chat",
        })
    }
}

/// An inbound signaling envelope. The sender is implicit (the connection).
///
/// `to == None` broadcasts to every other member; `Some(id)` is a direct
/// message delivered to that member only.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    pub kind: SignalKind,
    pub to: Option<ClientId>,
    /// Opaque to the server: SDP, ICE candidate, text.
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Game geometry
// ---------------------------------------------------------------------------

/// A position in the play field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One of the two paddle slots in a game room. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    /// The slot on the other side of the field.
    pub fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> u8 {
        match slot {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("player slot must be 1 or 2, got {other}")),
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Bullet identifier, unique and increasing within one room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BulletId(pub u64);

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

/// A live projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub id: BulletId,
    pub x: f64,
    pub y: f64,
    pub owner: PlayerSlot,
}

impl Bullet {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Paddle and ball positions plus the "both players present" flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub ready: bool,
    pub ball: Point,
    pub player1: Point,
    pub player2: Point,
}

/// The game part of a join snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// The slot assigned to the receiving client.
    pub slot: PlayerSlot,
    pub state: GameView,
    pub bullets: Vec<Bullet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        assert_eq!(serde_json::to_string(&RoomId::new("r1")).unwrap(), "\"r1\"");
        assert_eq!(serde_json::to_string(&ClientId::new("x")).unwrap(), "\"x\"");
        assert_eq!(serde_json::to_string(&BulletId(4)).unwrap(), "4");
    }

    #[test]
    fn test_player_slot_is_numeric_on_the_wire() {
        assert_eq!(serde_json::to_string(&PlayerSlot::Two).unwrap(), "2");
        let slot: PlayerSlot = serde_json::from_str("1").unwrap();
        assert_eq!(slot, PlayerSlot::One);
        assert!(serde_json::from_str::<PlayerSlot>("3").is_err());
    }

    #[test]
    fn test_player_slot_opponent() {
        assert_eq!(PlayerSlot::One.opponent(), PlayerSlot::Two);
        assert_eq!(PlayerSlot::Two.opponent(), PlayerSlot::One);
    }

    #[test]
    fn test_signal_kind_kebab_case() {
        let json = serde_json::to_string(&SignalKind::IceCandidate).unwrap();
        assert_eq!(json, "\"ice-candidate\"");
        assert_eq!(SignalKind::IceCandidate.to_string(), "ice-candidate");
    }

    #[test]
    fn test_member_from_identity() {
        let identity = Identity::new("u-1", "Alice");
        let member = Member::from(&identity);
        assert_eq!(member.id, ClientId::new("u-1"));
        assert_eq!(member.name, "Alice");
    }

    #[test]
    fn test_bullet_json_shape() {
        let bullet = Bullet {
            id: BulletId(7),
            x: 100.0,
            y: 480.0,
            owner: PlayerSlot::One,
        };
        let json = serde_json::to_value(bullet).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["owner"], 1);
        assert_eq!(json["y"], 480.0);
    }
}
