//! Team endpoints
//!
//! Role capability comes from the permission matrix; whether the caller
//! actually leads the addressed team is an instance check done here.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use lc_common::access::{AccessRequirement, Role};
use lc_common::models::{
    Announcement, AnnouncementPosting, NotificationKind, TeamProfile, TeamSettings,
};

use crate::AppState;

use super::auth::require;
use super::{ApiError, CurrentSession};

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub body: String,
}

fn permission(resource: &str, action: &str) -> AccessRequirement {
    AccessRequirement::Permission {
        resource: resource.to_string(),
        action: action.to_string(),
    }
}

/// The caller leads this team (or is an admin)
fn leads(team: &TeamProfile, session: &CurrentSession) -> bool {
    team.leader_id == session.identity.user_id || session.identity.role == Role::Admin
}

async fn load_team(state: &AppState, id: Uuid) -> Result<TeamProfile, ApiError> {
    state
        .store
        .team(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

/// POST /api/teams
///
/// Any user may found a team; the creator becomes its leader and is
/// promoted to the team_leader role.
pub async fn create_team(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<TeamProfile>, ApiError> {
    require(&state, &session, &permission("team", "create"))?;

    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Team name must not be empty"));
    }
    if session.identity.team_id.is_some() {
        return Err(ApiError::bad_request("Already a member of a team"));
    }

    let team = state
        .store
        .create_team(body.name.trim(), session.identity.user_id, &body.description)
        .await?;

    if session.identity.role == Role::User {
        state
            .store
            .set_role(session.identity.user_id, Role::TeamLeader)
            .await?;
    }

    Ok(Json(team))
}

/// GET /api/teams/:id
pub async fn get_team(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamProfile>, ApiError> {
    require(&state, &session, &permission("team", "read"))?;
    let team = load_team(&state, id).await?;
    Ok(Json(team))
}

/// POST /api/teams/:id/invite
///
/// Creates a team_invite notification for the invited user.
pub async fn invite(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<InviteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&state, &session, &permission("team", "invite"))?;

    let team = load_team(&state, id).await?;
    if !leads(&team, &session) {
        return Err(ApiError::forbidden("Not the leader of this team"));
    }

    let invitee = state
        .store
        .user_by_email(&body.email)
        .await?
        .ok_or_else(|| ApiError::not_found("No user with that email"))?
        .profile;

    if invitee.team_id.is_some() {
        return Err(ApiError::bad_request("User is already on a team"));
    }

    state
        .store
        .create_notification(
            invitee.user_id,
            NotificationKind::TeamInvite,
            &format!("You have been invited to join {}", team.name),
            Some(team.team_id),
        )
        .await?;

    Ok(Json(serde_json::json!({ "status": "invited" })))
}

/// POST /api/teams/:id/accept
///
/// Joining requires a pending invite for this team (or the team to have
/// open enrollment).
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team = load_team(&state, id).await?;

    if session.identity.team_id.is_some() {
        return Err(ApiError::bad_request("Already a member of a team"));
    }

    let invited = state
        .store
        .notifications_for(session.identity.user_id)
        .await?
        .iter()
        .any(|n| {
            n.kind == NotificationKind::TeamInvite && n.related_team == Some(team.team_id)
        });

    if !invited && !team.settings.open_enrollment {
        return Err(ApiError::forbidden("No invitation for this team"));
    }

    state
        .store
        .set_team(session.identity.user_id, Some(team.team_id))
        .await?;

    Ok(Json(serde_json::json!({ "status": "joined" })))
}

/// POST /api/teams/:id/announcements
///
/// Posting rights follow the team's announcement_posting setting.
pub async fn post_announcement(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnnouncementRequest>,
) -> Result<Json<Announcement>, ApiError> {
    require(&state, &session, &permission("team", "announce"))?;

    let team = load_team(&state, id).await?;
    let is_member = session.identity.team_id == Some(team.team_id);
    if !is_member && !leads(&team, &session) {
        return Err(ApiError::forbidden("Not a member of this team"));
    }

    if team.settings.announcement_posting == AnnouncementPosting::LeaderOnly
        && !leads(&team, &session)
    {
        return Err(ApiError::forbidden("Only the team leader may post announcements"));
    }

    if body.body.trim().is_empty() {
        return Err(ApiError::bad_request("Announcement must not be empty"));
    }

    let announcement = state
        .store
        .add_announcement(team.team_id, session.identity.user_id, body.body.trim())
        .await?;

    // Members get a notification; the poster already knows
    for member in state.store.team_member_ids(team.team_id).await? {
        if member != session.identity.user_id {
            state
                .store
                .create_notification(
                    member,
                    NotificationKind::Announcement,
                    &format!("New announcement in {}", team.name),
                    Some(team.team_id),
                )
                .await?;
        }
    }

    Ok(Json(announcement))
}

/// PUT /api/teams/:id/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<TeamSettings>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&state, &session, &permission("team", "settings"))?;

    let team = load_team(&state, id).await?;
    if !leads(&team, &session) {
        return Err(ApiError::forbidden("Not the leader of this team"));
    }

    state.store.update_team_settings(team.team_id, &body).await?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}
