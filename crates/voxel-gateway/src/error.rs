use thiserror::Error;
use voxel_core::VoxelError;
use voxel_hub::HubError;
use voxel_sessions::SessionError;

/// Failures while acting on a decoded client message. None of them reach
/// the client; the pump logs them and keeps reading.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Voxel(#[from] VoxelError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
