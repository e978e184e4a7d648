use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VoxelError {
    /// Short error code string for logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            VoxelError::Config(_) => "CONFIG_ERROR",
            VoxelError::Database(_) => "DATABASE_ERROR",
            VoxelError::Timeout { .. } => "TIMEOUT",
            VoxelError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, VoxelError>;
