use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voxel_core::types::{GameType, NewEvent, PositionRecord};

use crate::error::{ProtocolError, Result};
use crate::kinds;

/// Raw inbound unit: parse the `type` discriminator first, then the body.
/// Wire: `{ "type": "move", "payload": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Signaling and media kinds relayed verbatim; the server never looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Audio,
    WebrtcOffer,
    WebrtcAnswer,
    WebrtcIceCandidate,
}

impl RelayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayKind::Audio => kinds::AUDIO,
            RelayKind::WebrtcOffer => kinds::WEBRTC_OFFER,
            RelayKind::WebrtcAnswer => kinds::WEBRTC_ANSWER,
            RelayKind::WebrtcIceCandidate => kinds::WEBRTC_ICE_CANDIDATE,
        }
    }
}

/// A validated client message. Every variant carries a fully typed payload,
/// so handlers never inspect untyped maps.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Move(PositionRecord),
    Relay(RelayKind),
    CreateEvent(NewEvent),
    CreateSession { game_type: GameType },
    JoinSession { session_id: String },
    StartGame { session_id: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionParams {
    game_type: GameType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRef {
    session_id: String,
}

impl ClientMessage {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let Envelope { kind, payload } = envelope;
        match kind.as_str() {
            kinds::MOVE => {
                let pos: PositionRecord = typed(&kind, payload)?;
                if pos.user_id.is_empty() {
                    return Err(ProtocolError::invalid(&kind, "userId must not be empty"));
                }
                Ok(ClientMessage::Move(pos))
            }
            kinds::AUDIO => Ok(ClientMessage::Relay(RelayKind::Audio)),
            kinds::WEBRTC_OFFER => Ok(ClientMessage::Relay(RelayKind::WebrtcOffer)),
            kinds::WEBRTC_ANSWER => Ok(ClientMessage::Relay(RelayKind::WebrtcAnswer)),
            kinds::WEBRTC_ICE_CANDIDATE => {
                Ok(ClientMessage::Relay(RelayKind::WebrtcIceCandidate))
            }
            kinds::CREATE_EVENT => {
                let event: NewEvent = typed(&kind, payload)?;
                if event.title.trim().is_empty() {
                    return Err(ProtocolError::invalid(&kind, "title must not be empty"));
                }
                Ok(ClientMessage::CreateEvent(event))
            }
            kinds::CREATE_SESSION => {
                let params: CreateSessionParams = typed(&kind, payload)?;
                Ok(ClientMessage::CreateSession {
                    game_type: params.game_type,
                })
            }
            kinds::JOIN_SESSION | kinds::START_GAME => {
                let target: SessionRef = typed(&kind, payload)?;
                if target.session_id.is_empty() {
                    return Err(ProtocolError::invalid(&kind, "sessionId must not be empty"));
                }
                let session_id = target.session_id;
                if kind == kinds::JOIN_SESSION {
                    Ok(ClientMessage::JoinSession { session_id })
                } else {
                    Ok(ClientMessage::StartGame { session_id })
                }
            }
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Move(_) => kinds::MOVE,
            ClientMessage::Relay(relay) => relay.as_str(),
            ClientMessage::CreateEvent(_) => kinds::CREATE_EVENT,
            ClientMessage::CreateSession { .. } => kinds::CREATE_SESSION,
            ClientMessage::JoinSession { .. } => kinds::JOIN_SESSION,
            ClientMessage::StartGame { .. } => kinds::START_GAME,
        }
    }
}

fn typed<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::invalid(kind, e.to_string()))
}
