use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use voxel_core::types::{ConnId, GameSession, GameType, Scope};
use voxel_hub::HubHandle;
use voxel_protocol::ServerMessage;

use crate::error::Result;
use crate::table::SessionTable;

/// Serializes every session mutation and hands the resulting
/// `session_update` to the hub.
///
/// The lock is held across the hub enqueue so announcements leave in the
/// same order as the mutations that produced them. Delivery itself is the
/// hub's job, interleaved per recipient with position and audio traffic.
pub struct SessionManager {
    table: Mutex<SessionTable>,
    hub: HubHandle,
}

impl SessionManager {
    pub fn new(hub: HubHandle) -> Self {
        Self {
            table: Mutex::new(SessionTable::new()),
            hub,
        }
    }

    /// Create a session hosted by `host_id` and move the host's connection
    /// into it.
    #[instrument(skip(self, conn), fields(conn_id = %conn))]
    pub async fn create_session(&self, conn: ConnId, host_id: &str, game_type: GameType) -> Result<GameSession> {
        let mut table = self.table.lock().await;
        let session = table.create(host_id, game_type, Utc::now());
        info!(session_id = %session.id, "session created");
        self.announce(Some(conn), &session).await?;
        Ok(session)
    }

    /// Join an existing session. Unknown ids are ignored (`Ok(None)`).
    #[instrument(skip(self, conn), fields(conn_id = %conn))]
    pub async fn join_session(&self, session_id: &str, conn: ConnId, user_id: &str) -> Result<Option<GameSession>> {
        let mut table = self.table.lock().await;
        match table.join(session_id, user_id) {
            Ok(session) => {
                info!(players = session.players.len(), "joined session");
                self.announce(Some(conn), &session).await?;
                Ok(Some(session))
            }
            Err(reason) => {
                debug!(%reason, "join ignored");
                Ok(None)
            }
        }
    }

    /// Host-only LOBBY → PLAYING. Anything else is ignored (`Ok(None)`).
    #[instrument(skip(self))]
    pub async fn start_game(&self, session_id: &str, user_id: &str) -> Result<Option<GameSession>> {
        let mut table = self.table.lock().await;
        match table.start(session_id, user_id) {
            Ok(session) => {
                info!("game started");
                self.announce(None, &session).await?;
                Ok(Some(session))
            }
            Err(reason) => {
                debug!(%reason, "start ignored");
                Ok(None)
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<GameSession> {
        self.table.lock().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Remove sessions nobody has been connected to for `ttl`. Returns the
    /// number removed.
    pub async fn reap_vacant(&self, ttl: Duration) -> Result<usize> {
        let mut table = self.table.lock().await;
        // asked under the lock: every Assign enqueued by a finished
        // create/join is already reflected
        let occupied = self.hub.occupied_sessions().await?;
        let expired = table.reap(&occupied, ttl, Instant::now());
        for id in &expired {
            info!(session_id = %id, "reaped vacant session");
        }
        Ok(expired.len())
    }

    async fn announce(&self, member: Option<ConnId>, session: &GameSession) -> Result<()> {
        let scope = Scope::Session(session.id.clone());
        if let Some(conn) = member {
            self.hub.assign(conn, scope.clone()).await?;
        }
        self.hub
            .broadcast_scoped(&ServerMessage::SessionUpdate(session.clone()), scope, None)
            .await?;
        Ok(())
    }
}
