use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use voxel_core::types::{User, VoxelEvent};
use voxel_core::{Result, VoxelError};
use voxel_store::Store;

/// Async face of the blocking store. Each call runs on the blocking pool
/// under `store.timeout_ms`; a timed-out call is abandoned, never retried.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn Store>,
    timeout: Duration,
}

impl StoreClient {
    pub fn new(inner: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn find_or_create_user(&self, username: String, avatar_url: String) -> Result<User> {
        self.call("find_or_create_user", move |store| {
            store.find_or_create_user(&username, &avatar_url)
        })
        .await
    }

    pub async fn insert_event(&self, event: VoxelEvent) -> Result<()> {
        self.call("insert_event", move |store| store.insert_event(&event))
            .await
    }

    pub async fn list_events(&self) -> Result<Vec<VoxelEvent>> {
        self.call("list_events", |store| store.list_events()).await
    }

    async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> voxel_store::error::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));
        let ms = self.timeout.as_millis() as u64;

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                warn!(op, error = %e, "store call failed");
                Err(VoxelError::Database(e.to_string()))
            }
            Ok(Err(join)) => Err(VoxelError::Internal(format!("{op} panicked: {join}"))),
            Err(_) => {
                warn!(op, ms, "store call timed out");
                Err(VoxelError::Timeout { ms })
            }
        }
    }
}
