use chrono::{DateTime, Utc};
use rusqlite::Connection;
use voxel_core::types::{User, VoxelEvent};

use crate::error::{Result, StoreError};

/// Column order shared by every users SELECT in this crate.
pub(crate) const USER_SELECT_SQL: &str =
    "SELECT id, username, avatar_url, created_at, last_seen, x, y, latitude, longitude
     FROM users WHERE username = ?1";

/// Column order shared by every events SELECT in this crate.
pub(crate) const EVENT_SELECT_SQL: &str =
    "SELECT id, title, description, x, y, creator_id, start_time,
            ticket_price, has_tickets, voxel_theme, created_at
     FROM events ORDER BY created_at ASC, id ASC";

/// Initialise the users and events tables.
///
/// Safe to call on every startup: `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY NOT NULL,
            username    TEXT NOT NULL UNIQUE,
            avatar_url  TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            last_seen   TEXT NOT NULL,
            x           REAL NOT NULL DEFAULT 500,
            y           REAL NOT NULL DEFAULT 500,
            latitude    REAL NOT NULL DEFAULT 0,
            longitude   REAL NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS events (
            id           TEXT PRIMARY KEY NOT NULL,
            title        TEXT NOT NULL,
            description  TEXT NOT NULL,
            x            REAL NOT NULL,
            y            REAL NOT NULL,
            creator_id   TEXT NOT NULL,
            start_time   TEXT NOT NULL,
            ticket_price REAL NOT NULL,
            has_tickets  INTEGER NOT NULL,
            voxel_theme  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_created
            ON events(created_at);",
    )?;
    Ok(())
}

/// Raw column values, converted outside the rusqlite row closure so that a
/// bad timestamp surfaces as `StoreError::Corrupt` instead of a panic.
pub(crate) struct UserRow {
    id: String,
    username: String,
    avatar_url: String,
    created_at: String,
    last_seen: String,
    x: f64,
    y: f64,
    latitude: f64,
    longitude: f64,
}

pub(crate) fn read_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        avatar_url: row.get(2)?,
        created_at: row.get(3)?,
        last_seen: row.get(4)?,
        x: row.get(5)?,
        y: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
    })
}

impl UserRow {
    pub(crate) fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            avatar_url: self.avatar_url,
            created_at: parse_ts("users.created_at", &self.created_at)?,
            last_seen: parse_ts("users.last_seen", &self.last_seen)?,
            x: self.x,
            y: self.y,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

pub(crate) struct EventRow {
    id: String,
    title: String,
    description: String,
    x: f64,
    y: f64,
    creator_id: String,
    start_time: String,
    ticket_price: f64,
    has_tickets: bool,
    voxel_theme: String,
    created_at: String,
}

pub(crate) fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        creator_id: row.get(5)?,
        start_time: row.get(6)?,
        ticket_price: row.get(7)?,
        has_tickets: row.get::<_, i32>(8)? != 0,
        voxel_theme: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl EventRow {
    pub(crate) fn into_event(self) -> Result<VoxelEvent> {
        Ok(VoxelEvent {
            id: self.id,
            title: self.title,
            description: self.description,
            x: self.x,
            y: self.y,
            creator_id: self.creator_id,
            start_time: parse_ts("events.start_time", &self.start_time)?,
            ticket_price: self.ticket_price,
            has_tickets: self.has_tickets,
            voxel_theme: self.voxel_theme,
            created_at: parse_ts("events.created_at", &self.created_at)?,
        })
    }
}

fn parse_ts(column: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            column,
            reason: e.to_string(),
        })
}
