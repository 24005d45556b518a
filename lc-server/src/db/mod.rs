//! Database access layer
//!
//! SQLite via sqlx. One module per table group; all operations hang off
//! [`Store`], which couples the connection pool with the change-event bus
//! so every write path emits its change notification in one place.

pub mod curricula;
pub mod notifications;
pub mod sessions;
pub mod snapshots;
pub mod teams;
pub mod users;

pub use snapshots::SnapshotSource;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use lc_common::events::EventBus;
use lc_common::{Error, Result};

/// Document store handle: pool + change-event bus
///
/// Writes emit an [`lc_common::events::LcEvent`] after committing, which is
/// what the per-session realtime aggregators subscribe to.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    bus: EventBus,
}

impl Store {
    pub fn new(pool: SqlitePool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

/// Open (creating if missing) the database file and apply the schema
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!("Database ready at {}", path.display());
    Ok(pool)
}

/// In-memory database for tests
///
/// Single connection: each sqlite::memory: connection is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create tables if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            team_id TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS curricula (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            visibility TEXT NOT NULL,
            approval TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS curriculum_videos (
            curriculum_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            title TEXT NOT NULL,
            thumbnail_url TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            channel TEXT NOT NULL,
            position INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (curriculum_id, video_id)
        )",
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            body TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            related_team TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS teams (
            team_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            leader_id TEXT NOT NULL,
            description TEXT NOT NULL,
            open_enrollment INTEGER NOT NULL DEFAULT 0,
            announcement_posting TEXT NOT NULL DEFAULT 'leader_only'
        )",
        "CREATE TABLE IF NOT EXISTS announcements (
            id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_curricula_owner ON curricula(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_users_team ON users(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_announcements_team ON announcements(team_id)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Parse a TEXT column holding a UUID
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Parse a TEXT column holding an RFC 3339 timestamp
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let pool = connect(&path).await.unwrap();
        assert!(path.exists());

        // Schema is in place and re-running it is harmless
        sqlx::query("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
        assert!(parse_timestamp("not a timestamp").is_err());
    }
}
