//! Inbound and outbound frames.
//!
//! Outbound frames are a single internally tagged enum. Inbound frames are
//! decoded by hand in two stages so that the set of accepted `type` values
//! can include aliases (`videochat`, `offer`, `answer`, `ice-candidate`
//! all produce [`ClientFrame::Signal`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Bullet, BulletId, ChatMessage, ClientId, Codec, GameSnapshot, GameView,
    Member, PlayerSlot, Point, ProtocolError, SignalFrame, SignalKind,
};

/// A frame sent by a client, after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Append a line to the room's chat log.
    Chat { text: String },
    /// Relay a WebRTC signaling payload.
    Signal(SignalFrame),
    /// Move the sender's paddle (game rooms).
    Move(Point),
    /// Fire a bullet from the given position (game rooms).
    Fire(Point),
}

impl ClientFrame {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Signal(_) => "signal",
            Self::Move(_) => "move",
            Self::Fire(_) => "bullet",
        }
    }
}

/// A frame produced by the server.
///
/// Serialized as `{"type": "<kebab-case variant>", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Sent once to a newly admitted client.
    Snapshot {
        you: Member,
        /// Members already present, excluding the receiver.
        members: Vec<Member>,
        history: Vec<ChatMessage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game: Option<GameSnapshot>,
    },
    MemberJoined {
        member: Member,
    },
    MemberLeft {
        member: Member,
    },
    /// The whole chat log, oldest first.
    ChatLog {
        messages: Vec<ChatMessage>,
    },
    Signal {
        kind: SignalKind,
        from: ClientId,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        to: Option<ClientId>,
        payload: Value,
    },
    GameState(GameView),
    BulletCreated(Bullet),
    BulletUpdated(Bullet),
    BulletRemoved {
        id: BulletId,
    },
    /// `slot` is the player that was struck.
    Hit {
        slot: PlayerSlot,
        bullet: BulletId,
    },
    Error {
        code: u16,
        message: String,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct ChatBody {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalBody {
    kind: Option<SignalKind>,
    to: Option<String>,
    payload: Option<Value>,
    // Older clients put the payload under a field named after its kind.
    offer: Option<Value>,
    answer: Option<Value>,
    ice_candidate: Option<Value>,
}

impl SignalBody {
    fn into_frame(self, implied: Option<SignalKind>) -> Result<SignalFrame, ProtocolError> {
        let legacy = [
            (SignalKind::Offer, self.offer),
            (SignalKind::Answer, self.answer),
            (SignalKind::IceCandidate, self.ice_candidate),
        ]
        .into_iter()
        .find_map(|(kind, value)| value.map(|v| (kind, v)));

        let kind = implied
            .or(self.kind)
            .or(legacy.as_ref().map(|(kind, _)| *kind))
            .ok_or_else(|| {
                ProtocolError::InvalidMessage("signaling frame names no signal kind".into())
            })?;

        let payload = self
            .payload
            .or(legacy.map(|(_, v)| v))
            .unwrap_or(Value::Null);

        let to = self.to.filter(|to| !to.is_empty()).map(ClientId::new);

        Ok(SignalFrame { kind, to, payload })
    }
}

/// Decodes one inbound frame: the `type` tag first, then the body for it.
///
/// # Errors
/// - `ProtocolError::Decode` for malformed JSON or a body that does not
///   fit its tag.
/// - `ProtocolError::UnknownType` for an unrecognized or missing tag.
/// - `ProtocolError::InvalidMessage` for a signaling frame with no kind.
pub fn decode_client_frame<C: Codec>(codec: &C, data: &[u8]) -> Result<ClientFrame, ProtocolError> {
    let envelope: Envelope = codec.decode(data)?;
    let tag = envelope.kind.unwrap_or_default();

    match tag.as_str() {
        "chat" => {
            let body: ChatBody = codec.decode(data)?;
            Ok(ClientFrame::Chat { text: body.text })
        }
        "videochat" => {
            let body: SignalBody = codec.decode(data)?;
            Ok(ClientFrame::Signal(body.into_frame(None)?))
        }
        "offer" | "answer" | "ice-candidate" => {
            let implied = match tag.as_str() {
                "offer" => SignalKind::Offer,
                "answer" => SignalKind::Answer,
                _ => SignalKind::IceCandidate,
            };
            let body: SignalBody = codec.decode(data)?;
            Ok(ClientFrame::Signal(body.into_frame(Some(implied))?))
        }
        "move" => Ok(ClientFrame::Move(codec.decode(data)?)),
        "bullet" => Ok(ClientFrame::Fire(codec.decode(data)?)),
        _ => Err(ProtocolError::UnknownType(tag)),
    }
}
