use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use voxel_core::types::{GameSession, GameState, GameType};

use crate::error::Rejection;

struct Entry {
    session: GameSession,
    /// When the reaper first saw no live connection in this session.
    vacant_since: Option<Instant>,
}

/// In-memory session state and its transition rules. Holds no locks and
/// sends nothing; `SessionManager` serializes access and announces results.
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<String, Entry>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// New session in LOBBY with the host as its only player.
    pub fn create(&mut self, host_id: &str, game_type: GameType, now: DateTime<Utc>) -> GameSession {
        let session = GameSession {
            id: Uuid::new_v4().to_string(),
            host_id: host_id.to_string(),
            game_type,
            state: GameState::Lobby,
            players: vec![host_id.to_string()],
            created_at: now,
        };
        self.sessions.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                vacant_since: None,
            },
        );
        session
    }

    /// Add the user if absent. Joining twice is a no-op that still succeeds.
    pub fn join(&mut self, session_id: &str, user_id: &str) -> Result<GameSession, Rejection> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or(Rejection::UnknownSession)?;
        let players = &mut entry.session.players;
        if !players.iter().any(|p| p == user_id) {
            players.push(user_id.to_string());
        }
        Ok(entry.session.clone())
    }

    /// LOBBY → PLAYING, host only.
    pub fn start(&mut self, session_id: &str, user_id: &str) -> Result<GameSession, Rejection> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or(Rejection::UnknownSession)?;
        if entry.session.host_id != user_id {
            return Err(Rejection::NotHost);
        }
        if entry.session.state != GameState::Lobby {
            return Err(Rejection::NotInLobby);
        }
        entry.session.state = GameState::Playing;
        Ok(entry.session.clone())
    }

    pub fn get(&self, session_id: &str) -> Option<&GameSession> {
        self.sessions.get(session_id).map(|e| &e.session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions that have had no live connection for at least `ttl`.
    ///
    /// Vacancy is measured across calls: the first pass that finds a session
    /// unoccupied starts its clock, any pass that finds it occupied resets it.
    pub fn reap(&mut self, occupied: &HashSet<String>, ttl: Duration, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();
        for (id, entry) in self.sessions.iter_mut() {
            if occupied.contains(id) {
                entry.vacant_since = None;
                continue;
            }
            let since = *entry.vacant_since.get_or_insert(now);
            if now.duration_since(since) >= ttl {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }
}
