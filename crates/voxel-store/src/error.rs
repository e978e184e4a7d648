use thiserror::Error;

/// Errors raised by the persistence layer. Kept separate from VoxelError so
/// the gateway decides how a failed write is reported.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid stored value in {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },

    /// A previous holder of the connection lock panicked.
    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
