pub mod db;
pub mod error;
pub mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteStore;

use voxel_core::types::{User, VoxelEvent};

/// Persistence for accounts and world events.
///
/// Calls are blocking; async callers run them on a blocking thread under a
/// timeout and never retry.
pub trait Store: Send + Sync {
    /// Return the user with this username, creating it on first login.
    fn find_or_create_user(&self, username: &str, avatar_url: &str) -> error::Result<User>;

    fn insert_event(&self, event: &VoxelEvent) -> error::Result<()>;

    /// Full event catalog, oldest first.
    fn list_events(&self) -> error::Result<Vec<VoxelEvent>>;
}
