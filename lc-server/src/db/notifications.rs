//! Notification table operations

use chrono::Utc;
use uuid::Uuid;

use lc_common::events::LcEvent;
use lc_common::models::{Notification, NotificationKind};
use lc_common::{Error, Result};

use super::{parse_timestamp, parse_uuid, Store};

fn kind_to_str(k: NotificationKind) -> &'static str {
    match k {
        NotificationKind::TeamInvite => "team_invite",
        NotificationKind::Announcement => "announcement",
        NotificationKind::Moderation => "moderation",
        NotificationKind::System => "system",
    }
}

fn kind_from_str(s: &str) -> Result<NotificationKind> {
    match s {
        "team_invite" => Ok(NotificationKind::TeamInvite),
        "announcement" => Ok(NotificationKind::Announcement),
        "moderation" => Ok(NotificationKind::Moderation),
        "system" => Ok(NotificationKind::System),
        other => Err(Error::Internal(format!(
            "Invalid notification kind: {}",
            other
        ))),
    }
}

type NotificationTuple = (
    String,         // id
    String,         // user_id
    String,         // kind
    String,         // body
    i64,            // read
    Option<String>, // related_team
    String,         // created_at
);

fn notification_from_tuple(row: NotificationTuple) -> Result<Notification> {
    Ok(Notification {
        id: parse_uuid(&row.0)?,
        user_id: parse_uuid(&row.1)?,
        kind: kind_from_str(&row.2)?,
        body: row.3,
        read: row.4 != 0,
        related_team: row.5.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_timestamp(&row.6)?,
    })
}

impl Store {
    /// Create an unread notification for a user
    pub async fn create_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        body: &str,
        related_team: Option<Uuid>,
    ) -> Result<Notification> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, body, read, related_team, created_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(kind_to_str(kind))
        .bind(body)
        .bind(related_team.map(|t| t.to_string()))
        .bind(created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.bus().emit(LcEvent::NotificationsChanged { user_id });

        Ok(Notification {
            id,
            user_id,
            kind,
            body: body.to_string(),
            read: false,
            related_team,
            created_at,
        })
    }

    /// All notifications for a user, newest first
    pub async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationTuple> = sqlx::query_as(
            "SELECT id, user_id, kind, body, read, related_team, created_at
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(notification_from_tuple).collect()
    }

    /// Load one notification (ownership checks happen in the handler)
    pub async fn notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let row: Option<NotificationTuple> = sqlx::query_as(
            "SELECT id, user_id, kind, body, read, related_team, created_at
             FROM notifications WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.map(notification_from_tuple).transpose()
    }

    /// Set a notification's read flag
    pub async fn set_notification_read(&self, id: Uuid, user_id: Uuid, read: bool) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET read = ? WHERE id = ? AND user_id = ?")
            .bind(read as i64)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Notification {}", id)));
        }

        self.bus().emit(LcEvent::NotificationsChanged { user_id });
        Ok(())
    }
}
