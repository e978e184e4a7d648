use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use voxel_core::config::VoxelConfig;
use voxel_store::SqliteStore;

mod app;
mod error;
mod http;
mod reaper;
mod store;
mod ws;

use store::StoreClient;

#[derive(Debug, Parser)]
#[command(name = "voxel-gateway", version, about = "Real-time location, voice and game session relay")]
struct Cli {
    /// Path to voxel.toml. Falls back to VOXEL_CONFIG, then ~/.voxel/voxel.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "voxel_gateway=info,voxel_hub=info,voxel_sessions=info,tower_http=debug".into()
            }),
        )
        .init();

    // load config: --config > VOXEL_CONFIG env > ~/.voxel/voxel.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("VOXEL_CONFIG").ok());
    let config = VoxelConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        VoxelConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let store = StoreClient::new(Arc::new(SqliteStore::open(db_path)?), config.store.timeout());

    // the hub owns the event catalog from here on
    let events = store.list_events().await?;
    info!(events = events.len(), "event catalog loaded");
    let hub = voxel_hub::spawn(config.hub.command_queue, events);

    let sessions = voxel_sessions::SessionManager::new(hub.clone());
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;

    let state = Arc::new(app::AppState::new(config, hub, sessions, store));
    let router = app::build_router(state.clone());

    reaper::spawn(Arc::clone(&state));

    info!("Voxel gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
