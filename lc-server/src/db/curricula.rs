//! Curriculum table operations
//!
//! A curriculum row plus its ordered video rows. Content edits reset the
//! approval state to pending so moderation sees them again.

use chrono::Utc;
use uuid::Uuid;

use lc_common::events::LcEvent;
use lc_common::models::{ApprovalStatus, Curriculum, CurriculumVideo, Visibility};
use lc_common::{Error, Result};

use super::{parse_timestamp, parse_uuid, Store};

fn visibility_to_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Private => "private",
        Visibility::Team => "team",
        Visibility::Public => "public",
    }
}

fn visibility_from_str(s: &str) -> Result<Visibility> {
    match s {
        "private" => Ok(Visibility::Private),
        "team" => Ok(Visibility::Team),
        "public" => Ok(Visibility::Public),
        other => Err(Error::Internal(format!("Invalid visibility: {}", other))),
    }
}

fn approval_to_str(a: ApprovalStatus) -> &'static str {
    match a {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Rejected => "rejected",
    }
}

fn approval_from_str(s: &str) -> Result<ApprovalStatus> {
    match s {
        "pending" => Ok(ApprovalStatus::Pending),
        "approved" => Ok(ApprovalStatus::Approved),
        "rejected" => Ok(ApprovalStatus::Rejected),
        other => Err(Error::Internal(format!("Invalid approval: {}", other))),
    }
}

type CurriculumTuple = (
    String, // id
    String, // owner_id
    String, // title
    String, // description
    String, // visibility
    String, // approval
    String, // created_at
    String, // updated_at
);

impl Store {
    async fn videos_for(&self, curriculum_id: &str) -> Result<Vec<CurriculumVideo>> {
        let rows: Vec<(String, String, String, i64, String, i64, i64)> = sqlx::query_as(
            "SELECT video_id, title, thumbnail_url, duration_seconds, channel, position, completed
             FROM curriculum_videos WHERE curriculum_id = ? ORDER BY position",
        )
        .bind(curriculum_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(video_id, title, thumbnail_url, duration, channel, position, completed)| {
                    CurriculumVideo {
                        video_id,
                        title,
                        thumbnail_url,
                        duration_seconds: duration,
                        channel,
                        position,
                        completed: completed != 0,
                    }
                },
            )
            .collect())
    }

    async fn curriculum_from_tuple(&self, row: CurriculumTuple) -> Result<Curriculum> {
        let videos = self.videos_for(&row.0).await?;
        Ok(Curriculum {
            id: parse_uuid(&row.0)?,
            owner_id: parse_uuid(&row.1)?,
            title: row.2,
            description: row.3,
            visibility: visibility_from_str(&row.4)?,
            approval: approval_from_str(&row.5)?,
            videos,
            created_at: parse_timestamp(&row.6)?,
            updated_at: parse_timestamp(&row.7)?,
        })
    }

    /// Create a new curriculum in pending moderation state
    pub async fn create_curriculum(
        &self,
        owner_id: Uuid,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<Curriculum> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO curricula (id, owner_id, title, description, visibility, approval, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(title)
        .bind(description)
        .bind(visibility_to_str(visibility))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });

        Ok(Curriculum {
            id,
            owner_id,
            title: title.to_string(),
            description: description.to_string(),
            visibility,
            approval: ApprovalStatus::Pending,
            videos: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Load one curriculum with its videos
    pub async fn curriculum(&self, id: Uuid) -> Result<Option<Curriculum>> {
        let row: Option<CurriculumTuple> = sqlx::query_as(
            "SELECT id, owner_id, title, description, visibility, approval, created_at, updated_at
             FROM curricula WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(self.curriculum_from_tuple(row).await?)),
            None => Ok(None),
        }
    }

    /// All curricula owned by one user, newest first
    pub async fn curricula_by_owner(&self, owner_id: Uuid) -> Result<Vec<Curriculum>> {
        let rows: Vec<CurriculumTuple> = sqlx::query_as(
            "SELECT id, owner_id, title, description, visibility, approval, created_at, updated_at
             FROM curricula WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id.to_string())
        .fetch_all(self.pool())
        .await?;

        let mut curricula = Vec::with_capacity(rows.len());
        for row in rows {
            curricula.push(self.curriculum_from_tuple(row).await?);
        }
        Ok(curricula)
    }

    /// Update title, description and visibility; resets approval to pending
    pub async fn update_curriculum(
        &self,
        id: Uuid,
        owner_id: Uuid,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE curricula SET title = ?, description = ?, visibility = ?,
                    approval = 'pending', updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(visibility_to_str(visibility))
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Curriculum {}", id)));
        }

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });
        Ok(())
    }

    /// Delete a curriculum and its videos
    pub async fn delete_curriculum(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM curriculum_videos WHERE curriculum_id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        let result = sqlx::query("DELETE FROM curricula WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Curriculum {}", id)));
        }

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });
        Ok(())
    }

    /// Append a video at the end of a curriculum
    pub async fn add_video(
        &self,
        curriculum_id: Uuid,
        owner_id: Uuid,
        video: &CurriculumVideo,
    ) -> Result<()> {
        let next_position: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM curriculum_videos WHERE curriculum_id = ?",
        )
        .bind(curriculum_id.to_string())
        .fetch_one(self.pool())
        .await?;

        sqlx::query(
            "INSERT OR REPLACE INTO curriculum_videos
             (curriculum_id, video_id, title, thumbnail_url, duration_seconds, channel, position, completed)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(curriculum_id.to_string())
        .bind(&video.video_id)
        .bind(&video.title)
        .bind(&video.thumbnail_url)
        .bind(video.duration_seconds)
        .bind(&video.channel)
        .bind(next_position.0)
        .execute(self.pool())
        .await?;

        sqlx::query("UPDATE curricula SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(curriculum_id.to_string())
            .execute(self.pool())
            .await?;

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });
        Ok(())
    }

    /// Toggle a video's completed flag
    pub async fn set_video_completed(
        &self,
        curriculum_id: Uuid,
        owner_id: Uuid,
        video_id: &str,
        completed: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE curriculum_videos SET completed = ? WHERE curriculum_id = ? AND video_id = ?",
        )
        .bind(completed as i64)
        .bind(curriculum_id.to_string())
        .bind(video_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "Video {} in curriculum {}",
                video_id, curriculum_id
            )));
        }

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });
        Ok(())
    }

    /// Curricula awaiting moderation, oldest first
    pub async fn pending_curricula(&self) -> Result<Vec<Curriculum>> {
        let rows: Vec<CurriculumTuple> = sqlx::query_as(
            "SELECT id, owner_id, title, description, visibility, approval, created_at, updated_at
             FROM curricula WHERE approval = 'pending' ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;

        let mut curricula = Vec::with_capacity(rows.len());
        for row in rows {
            curricula.push(self.curriculum_from_tuple(row).await?);
        }
        Ok(curricula)
    }

    /// Set moderation state, returning the owner (for the notification)
    pub async fn set_approval(&self, id: Uuid, approval: ApprovalStatus) -> Result<Uuid> {
        let row: Option<(String,)> = sqlx::query_as("SELECT owner_id FROM curricula WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;

        let owner_id = match row {
            Some((owner,)) => parse_uuid(&owner)?,
            None => return Err(Error::NotFound(format!("Curriculum {}", id))),
        };

        sqlx::query("UPDATE curricula SET approval = ?, updated_at = ? WHERE id = ?")
            .bind(approval_to_str(approval))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        self.bus().emit(LcEvent::CurriculaChanged { owner_id });
        Ok(owner_id)
    }
}
