//! Domain models
//!
//! Plain serde structs mirroring the database tables. Each realtime slice
//! (curricula, notifications, profile, team) is built from these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Role;

/// Who can see a curriculum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Team,
    Public,
}

/// Moderation state of a curriculum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A learning curriculum: an ordered list of videos owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub approval: ApprovalStatus,
    pub videos: Vec<CurriculumVideo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One video entry within a curriculum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumVideo {
    /// YouTube video id (11-character watch id)
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: i64,
    pub channel: String,
    /// Zero-based position within the curriculum
    pub position: i64,
    /// Whether the owner has marked this video watched
    pub completed: bool,
}

/// Notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TeamInvite,
    Announcement,
    Moderation,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub body: String,
    pub read: bool,
    /// Team this notification refers to (invites, announcements)
    pub related_team: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Who may post team announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementPosting {
    LeaderOnly,
    AllMembers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSettings {
    /// When true, invited users join without leader confirmation
    pub open_enrollment: bool,
    pub announcement_posting: AnnouncementPosting,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            open_enrollment: false,
            announcement_posting: AnnouncementPosting::LeaderOnly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamProfile {
    pub team_id: Uuid,
    pub name: String,
    pub leader_id: Uuid,
    pub description: String,
    pub announcements: Vec<Announcement>,
    pub member_count: i64,
    pub settings: TeamSettings,
}

/// One result row from the YouTube search integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSearchResult {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration: i64,
    pub channel: String,
}

/// Single-video metadata from the oEmbed integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEmbed {
    pub title: String,
    pub author: String,
    pub thumbnail: String,
}
