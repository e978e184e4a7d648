use thiserror::Error;

/// Decode failures for inbound envelopes. The gateway treats each variant
/// differently: malformed frames are dropped, unknown kinds ignored, and
/// invalid payloads answered with an `error` envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "MALFORMED_FRAME",
            ProtocolError::UnknownType(_) => "UNKNOWN_TYPE",
            ProtocolError::InvalidPayload { .. } => "INVALID_PAYLOAD",
        }
    }

    pub(crate) fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidPayload {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
