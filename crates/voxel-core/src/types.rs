use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one live transport. Two tabs of the same user are two
/// connections with the same `user_id` but distinct `ConnId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broadcast scope of a connection: the shared world, or one game session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    World,
    Session(String),
}

impl Scope {
    /// Empty or missing ids mean the world scope.
    pub fn from_session_id(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.is_empty() => Scope::Session(id.to_string()),
            _ => Scope::World,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Scope::World => None,
            Scope::Session(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::World => f.write_str("world"),
            Scope::Session(id) => write!(f, "session:{}", id),
        }
    }
}

/// Last reported location of a user, in both map and real-world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

/// A persisted world event. Timestamps are always stamped server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoxelEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub creator_id: String,
    pub start_time: DateTime<Utc>,
    pub ticket_price: f64,
    pub has_tickets: bool,
    pub voxel_theme: String,
    pub created_at: DateTime<Utc>,
}

/// Client-supplied part of an event. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub creator_id: String,
    pub ticket_price: f64,
    pub has_tickets: bool,
    pub voxel_theme: String,
}

impl NewEvent {
    /// Assign an id and server timestamps.
    pub fn stamp(self, now: DateTime<Utc>) -> VoxelEvent {
        VoxelEvent {
            id: Uuid::now_v7().to_string(),
            title: self.title,
            description: self.description,
            x: self.x,
            y: self.y,
            creator_id: self.creator_id,
            start_time: now,
            ticket_price: self.ticket_price,
            has_tickets: self.has_tickets,
            voxel_theme: self.voxel_theme,
            created_at: now,
        }
    }
}

/// Lifecycle of a game session. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Lobby,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    ProximityTag,
    TreasureHunt,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::ProximityTag => f.write_str("PROXIMITY_TAG"),
            GameType::TreasureHunt => f.write_str("TREASURE_HUNT"),
        }
    }
}

/// Snapshot of a game session as announced in `session_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: String,
    pub host_id: String,
    pub game_type: GameType,
    pub state: GameState,
    /// Join order, no duplicates.
    pub players: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Account record returned by the store's find-or-create lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub latitude: f64,
    pub longitude: f64,
}
