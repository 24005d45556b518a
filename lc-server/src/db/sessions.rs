//! Session table operations
//!
//! Sessions are stored by token hash only; the bearer token itself never
//! touches the database.

use chrono::Utc;
use uuid::Uuid;

use lc_common::Result;

use super::{parse_uuid, Store};

impl Store {
    /// Persist a new session
    pub async fn insert_session(&self, token_hash: &str, user_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sessions (token_hash, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Resolve a token hash to its user, if the session exists
    pub async fn session_user(&self, token_hash: &str) -> Result<Option<Uuid>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(self.pool())
                .await?;

        row.map(|(id,)| parse_uuid(&id)).transpose()
    }

    /// Remove one session; idempotent
    pub async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Remove all of a user's sessions, returning the removed token hashes
    /// so their aggregators can be torn down
    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT token_hash FROM sessions WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_all(self.pool())
                .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        Ok(rows.into_iter().map(|(h,)| h).collect())
    }
}
