//! Team and announcement table operations

use chrono::Utc;
use uuid::Uuid;

use lc_common::events::LcEvent;
use lc_common::models::{
    Announcement, AnnouncementPosting, TeamProfile, TeamSettings,
};
use lc_common::{Error, Result};

use super::{parse_timestamp, parse_uuid, Store};

fn posting_to_str(p: AnnouncementPosting) -> &'static str {
    match p {
        AnnouncementPosting::LeaderOnly => "leader_only",
        AnnouncementPosting::AllMembers => "all_members",
    }
}

fn posting_from_str(s: &str) -> Result<AnnouncementPosting> {
    match s {
        "leader_only" => Ok(AnnouncementPosting::LeaderOnly),
        "all_members" => Ok(AnnouncementPosting::AllMembers),
        other => Err(Error::Internal(format!(
            "Invalid announcement_posting: {}",
            other
        ))),
    }
}

impl Store {
    /// Create a team led by `leader_id`
    ///
    /// The leader's profile is updated to reference the new team; the
    /// role promotion to team_leader is the caller's decision.
    pub async fn create_team(
        &self,
        name: &str,
        leader_id: Uuid,
        description: &str,
    ) -> Result<TeamProfile> {
        let team_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO teams (team_id, name, leader_id, description, open_enrollment, announcement_posting)
             VALUES (?, ?, ?, ?, 0, 'leader_only')",
        )
        .bind(team_id.to_string())
        .bind(name)
        .bind(leader_id.to_string())
        .bind(description)
        .execute(self.pool())
        .await?;

        self.set_team(leader_id, Some(team_id)).await?;

        self.bus().emit(LcEvent::TeamChanged { team_id });

        Ok(TeamProfile {
            team_id,
            name: name.to_string(),
            leader_id,
            description: description.to_string(),
            announcements: Vec::new(),
            member_count: 1,
            settings: TeamSettings::default(),
        })
    }

    /// Load a team profile with announcements and member count
    pub async fn team(&self, team_id: Uuid) -> Result<Option<TeamProfile>> {
        let row: Option<(String, String, String, String, i64, String)> = sqlx::query_as(
            "SELECT team_id, name, leader_id, description, open_enrollment, announcement_posting
             FROM teams WHERE team_id = ?",
        )
        .bind(team_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        let Some((id, name, leader, description, open_enrollment, posting)) = row else {
            return Ok(None);
        };

        let announcement_rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, author_id, body, created_at
             FROM announcements WHERE team_id = ? ORDER BY created_at DESC",
        )
        .bind(team_id.to_string())
        .fetch_all(self.pool())
        .await?;

        let mut announcements = Vec::with_capacity(announcement_rows.len());
        for (aid, author, body, created) in announcement_rows {
            announcements.push(Announcement {
                id: parse_uuid(&aid)?,
                author_id: parse_uuid(&author)?,
                body,
                created_at: parse_timestamp(&created)?,
            });
        }

        let member_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE team_id = ?")
                .bind(team_id.to_string())
                .fetch_one(self.pool())
                .await?;

        Ok(Some(TeamProfile {
            team_id: parse_uuid(&id)?,
            name,
            leader_id: parse_uuid(&leader)?,
            description,
            announcements,
            member_count: member_count.0,
            settings: TeamSettings {
                open_enrollment: open_enrollment != 0,
                announcement_posting: posting_from_str(&posting)?,
            },
        }))
    }

    /// Replace a team's settings
    pub async fn update_team_settings(&self, team_id: Uuid, settings: &TeamSettings) -> Result<()> {
        let result = sqlx::query(
            "UPDATE teams SET open_enrollment = ?, announcement_posting = ? WHERE team_id = ?",
        )
        .bind(settings.open_enrollment as i64)
        .bind(posting_to_str(settings.announcement_posting))
        .bind(team_id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Team {}", team_id)));
        }

        self.bus().emit(LcEvent::TeamChanged { team_id });
        Ok(())
    }

    /// Post an announcement to a team
    pub async fn add_announcement(
        &self,
        team_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<Announcement> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO announcements (id, team_id, author_id, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(team_id.to_string())
        .bind(author_id.to_string())
        .bind(body)
        .bind(created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        self.bus().emit(LcEvent::TeamChanged { team_id });

        Ok(Announcement {
            id,
            author_id,
            body: body.to_string(),
            created_at,
        })
    }

    /// Member user ids of one team
    pub async fn team_member_ids(&self, team_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT user_id FROM users WHERE team_id = ?")
            .bind(team_id.to_string())
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }
}
