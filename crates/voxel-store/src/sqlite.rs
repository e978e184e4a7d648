use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;
use voxel_core::types::{User, VoxelEvent};

use crate::db::{init_db, read_event_row, read_user_row, EVENT_SELECT_SQL, USER_SELECT_SQL};
use crate::error::{Result, StoreError};
use crate::Store;

/// Map position assigned to brand-new users.
const SPAWN_X: f64 = 500.0;
const SPAWN_Y: f64 = 500.0;

/// SQLite-backed store. A single connection behind a `Mutex` is plenty for
/// the write rate of one gateway process.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for SqliteStore {
    #[instrument(skip(self, avatar_url))]
    fn find_or_create_user(&self, username: &str, avatar_url: &str) -> Result<User> {
        let db = self.lock()?;

        // Fast path: returning user
        let existing = db
            .query_row(USER_SELECT_SQL, params![username], read_user_row)
            .optional()?;
        if let Some(row) = existing {
            debug!("existing user");
            return row.into_user();
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            avatar_url: avatar_url.to_string(),
            created_at: now,
            last_seen: now,
            x: SPAWN_X,
            y: SPAWN_Y,
            latitude: 0.0,
            longitude: 0.0,
        };
        db.execute(
            "INSERT INTO users
             (id, username, avatar_url, created_at, last_seen, x, y, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.username,
                user.avatar_url,
                ts(&now),
                user.x,
                user.y,
                user.latitude,
                user.longitude
            ],
        )?;
        info!(user_id = %user.id, "created user");
        Ok(user)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    fn insert_event(&self, event: &VoxelEvent) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "INSERT INTO events
             (id, title, description, x, y, creator_id, start_time,
              ticket_price, has_tickets, voxel_theme, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.id,
                event.title,
                event.description,
                event.x,
                event.y,
                event.creator_id,
                ts(&event.start_time),
                event.ticket_price,
                event.has_tickets as i32,
                event.voxel_theme,
                ts(&event.created_at)
            ],
        )?;
        Ok(())
    }

    fn list_events(&self) -> Result<Vec<VoxelEvent>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(EVENT_SELECT_SQL)?;
        let rows = stmt.query_map([], read_event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite equals time order.
fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
