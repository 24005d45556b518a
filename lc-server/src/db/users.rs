//! User table operations

use chrono::Utc;
use uuid::Uuid;

use lc_common::access::Role;
use lc_common::events::LcEvent;
use lc_common::models::UserProfile;
use lc_common::{Error, Result};

use super::{parse_timestamp, parse_uuid, Store};

/// User row with password material, used only by the login path
#[derive(Debug)]
pub struct UserAuthRow {
    pub profile: UserProfile,
    pub password_salt: String,
    pub password_hash: String,
}

type UserTuple = (
    String,         // user_id
    String,         // display_name
    String,         // email
    String,         // role
    Option<String>, // team_id
    String,         // created_at
);

fn profile_from_tuple(row: UserTuple) -> Result<UserProfile> {
    let role = Role::parse(&row.3)
        .ok_or_else(|| Error::Internal(format!("Invalid role in database: {}", row.3)))?;
    Ok(UserProfile {
        user_id: parse_uuid(&row.0)?,
        display_name: row.1,
        email: row.2,
        role,
        team_id: row.4.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_timestamp(&row.5)?,
    })
}

impl Store {
    /// Insert a new user with the given password material
    ///
    /// Returns `InvalidInput` when the email is already registered.
    pub async fn create_user(
        &self,
        display_name: &str,
        email: &str,
        password_salt: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserProfile> {
        let user_id = Uuid::new_v4();
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (user_id, display_name, email, password_salt, password_hash, role, team_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(user_id.to_string())
        .bind(display_name)
        .bind(email)
        .bind(password_salt)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(created_at.to_rfc3339())
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::InvalidInput(format!(
                    "Email already registered: {}",
                    email
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.bus().emit(LcEvent::ProfileChanged { user_id });

        Ok(UserProfile {
            user_id,
            display_name: display_name.to_string(),
            email: email.to_string(),
            role,
            team_id: None,
            created_at,
        })
    }

    /// Number of registered users
    pub async fn user_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(count.0)
    }

    /// Look up a user by email, including password material (login only)
    pub async fn user_by_email(&self, email: &str) -> Result<Option<UserAuthRow>> {
        let row: Option<(String, String, String, String, Option<String>, String, String, String)> =
            sqlx::query_as(
                "SELECT user_id, display_name, email, role, team_id, created_at, password_salt, password_hash
                 FROM users WHERE email = ?",
            )
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some((id, name, email, role, team, created, salt, hash)) => Ok(Some(UserAuthRow {
                profile: profile_from_tuple((id, name, email, role, team, created))?,
                password_salt: salt,
                password_hash: hash,
            })),
            None => Ok(None),
        }
    }

    /// Load one user's profile
    pub async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row: Option<UserTuple> = sqlx::query_as(
            "SELECT user_id, display_name, email, role, team_id, created_at
             FROM users WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(profile_from_tuple).transpose()
    }

    /// All user profiles, newest first (admin user management)
    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let rows: Vec<UserTuple> = sqlx::query_as(
            "SELECT user_id, display_name, email, role, team_id, created_at
             FROM users ORDER BY created_at DESC",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(profile_from_tuple).collect()
    }

    /// Change a user's role
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> Result<()> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE user_id = ?")
            .bind(role.as_str())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }

        self.bus().emit(LcEvent::ProfileChanged { user_id });
        Ok(())
    }

    /// Change a user's team membership
    pub async fn set_team(&self, user_id: Uuid, team_id: Option<Uuid>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET team_id = ? WHERE user_id = ?")
            .bind(team_id.map(|t| t.to_string()))
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }

        self.bus().emit(LcEvent::ProfileChanged { user_id });
        if let Some(team_id) = team_id {
            self.bus().emit(LcEvent::TeamChanged { team_id });
        }
        Ok(())
    }

    /// Delete a user and everything they own
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let id = user_id.to_string();
        let team_id = self.profile(user_id).await?.and_then(|p| p.team_id);

        sqlx::query(
            "DELETE FROM curriculum_videos WHERE curriculum_id IN
             (SELECT id FROM curricula WHERE owner_id = ?)",
        )
        .bind(&id)
        .execute(self.pool())
        .await?;
        sqlx::query("DELETE FROM curricula WHERE owner_id = ?")
            .bind(&id)
            .execute(self.pool())
            .await?;
        sqlx::query("DELETE FROM notifications WHERE user_id = ?")
            .bind(&id)
            .execute(self.pool())
            .await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&id)
            .execute(self.pool())
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(&id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }

        self.bus().emit(LcEvent::ProfileChanged { user_id });
        self.bus().emit(LcEvent::CurriculaChanged { owner_id: user_id });
        if let Some(team_id) = team_id {
            self.bus().emit(LcEvent::TeamChanged { team_id });
        }
        Ok(())
    }
}
