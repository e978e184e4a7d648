use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// The registry loop has exited; no further commands are accepted.
    #[error("hub event loop has shut down")]
    Closed,

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
