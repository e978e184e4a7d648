use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use voxel_core::config::VoxelConfig;
use voxel_hub::HubHandle;
use voxel_sessions::SessionManager;

use crate::store::StoreClient;

/// Central shared state, passed as Arc<AppState> to all Axum handlers and
/// every connection pump.
pub struct AppState {
    pub config: VoxelConfig,
    pub hub: HubHandle,
    pub sessions: SessionManager,
    pub store: StoreClient,
}

impl AppState {
    pub fn new(config: VoxelConfig, hub: HubHandle, sessions: SessionManager, store: StoreClient) -> Self {
        Self {
            config,
            hub,
            sessions,
            store,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/login", post(crate::http::login::login_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
