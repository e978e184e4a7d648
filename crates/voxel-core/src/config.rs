use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_FRAME_BYTES: usize = 2 * 1024 * 1024; // 2 MiB: large audio chunks
pub const PONG_WAIT_SECS: u64 = 60; // reader gives up without a pong in this window
pub const WRITE_WAIT_SECS: u64 = 10; // single frame write deadline
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024; // per-connection; full queue = eviction
pub const HUB_QUEUE_CAPACITY: usize = 1024;
pub const STORE_TIMEOUT_MS: u64 = 5_000;
pub const SESSION_IDLE_TTL_SECS: u64 = 600;
pub const SESSION_REAP_INTERVAL_SECS: u64 = 60;

/// Top-level config (voxel.toml + VOXEL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VoxelConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Per-connection websocket limits and liveness timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl TransportConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Pings go out at 90% of the pong window so a healthy peer always
    /// answers before the reader's deadline.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            pong_wait_secs: PONG_WAIT_SECS,
            write_wait_secs: WRITE_WAIT_SECS,
            outbound_queue: OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the command channel feeding the registry loop.
    #[serde(default = "default_hub_queue")]
    pub command_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_queue: HUB_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: STORE_TIMEOUT_MS,
        }
    }
}

/// Vacant-session garbage collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_session_idle_ttl")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_session_reap_interval")]
    pub reap_interval_secs: u64,
}

impl SessionsConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: SESSION_IDLE_TTL_SECS,
            reap_interval_secs: SESSION_REAP_INTERVAL_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_max_frame_bytes() -> usize {
    MAX_FRAME_BYTES
}
fn default_pong_wait_secs() -> u64 {
    PONG_WAIT_SECS
}
fn default_write_wait_secs() -> u64 {
    WRITE_WAIT_SECS
}
fn default_outbound_queue() -> usize {
    OUTBOUND_QUEUE_CAPACITY
}
fn default_hub_queue() -> usize {
    HUB_QUEUE_CAPACITY
}
fn default_store_timeout_ms() -> u64 {
    STORE_TIMEOUT_MS
}
fn default_session_idle_ttl() -> u64 {
    SESSION_IDLE_TTL_SECS
}
fn default_session_reap_interval() -> u64 {
    SESSION_REAP_INTERVAL_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.voxel/voxel.db", home)
}

impl VoxelConfig {
    /// Load config from a TOML file with VOXEL_* env var overrides.
    ///
    /// Precedence, lowest first: built-in defaults, the TOML file (explicit
    /// path or ~/.voxel/voxel.toml), then env vars such as
    /// `VOXEL_GATEWAY__PORT=9000`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: VoxelConfig = Figment::from(Serialized::defaults(VoxelConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("VOXEL_").split("__"))
            .extract()
            .map_err(|e| crate::error::VoxelError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with: zero-capacity channels
    /// and zero-length timers.
    pub fn validate(&self) -> crate::error::Result<()> {
        let checks = [
            ("transport.max_frame_bytes", self.transport.max_frame_bytes as u64),
            ("transport.pong_wait_secs", self.transport.pong_wait_secs),
            ("transport.write_wait_secs", self.transport.write_wait_secs),
            ("transport.outbound_queue", self.transport.outbound_queue as u64),
            ("hub.command_queue", self.hub.command_queue as u64),
            ("store.timeout_ms", self.store.timeout_ms),
            ("sessions.reap_interval_secs", self.sessions.reap_interval_secs),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(crate::error::VoxelError::Config(format!(
                "{key} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.voxel/voxel.toml", home)
}
