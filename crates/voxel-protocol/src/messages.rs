use serde::{Deserialize, Serialize};
use std::sync::Arc;
use voxel_core::types::{GameSession, PositionRecord, VoxelEvent};

use crate::kinds;

/// One encoded text frame. Shared between recipients during fan-out.
pub type Frame = Arc<str>;

/// Server → Client message.
/// Wire: `{ "type": "session_update", "payload": {...} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full event catalog, replayed once to every new connection.
    EventsList(Vec<VoxelEvent>),
    /// Cached position replayed to a new connection.
    Move(PositionRecord),
    Leave(LeavePayload),
    EventCreated(VoxelEvent),
    SessionUpdate(GameSession),
    Error(ErrorShape),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ServerMessage {
    pub fn leave(user_id: impl Into<String>) -> Self {
        ServerMessage::Leave(LeavePayload {
            user_id: user_id.into(),
        })
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorShape {
            code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::EventsList(_) => kinds::EVENTS_LIST,
            ServerMessage::Move(_) => kinds::MOVE,
            ServerMessage::Leave(_) => kinds::LEAVE,
            ServerMessage::EventCreated(_) => kinds::EVENT_CREATED,
            ServerMessage::SessionUpdate(_) => kinds::SESSION_UPDATE,
            ServerMessage::Error(_) => kinds::ERROR,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::from)
    }
}
