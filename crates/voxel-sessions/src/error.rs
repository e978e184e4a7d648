use thiserror::Error;
use voxel_hub::HubError;

/// Errors that can occur during session operations.
///
/// Rule violations (unknown session, non-host start) are not errors; they
/// surface as [`Rejection`] and are silently ignored by the manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The resulting announcement could not be handed to the hub.
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
}

/// Why a session command was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("session does not exist")]
    UnknownSession,

    #[error("only the host may start the game")]
    NotHost,

    #[error("game is not in the lobby")]
    NotInLobby,
}

pub type Result<T> = std::result::Result<T, SessionError>;
