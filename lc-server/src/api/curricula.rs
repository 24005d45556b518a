//! Curriculum endpoints
//!
//! Curricula are personal: every route operates on the caller's own
//! curricula. Visibility controls who else may read one (team members,
//! everyone, nobody); reads of another user's curriculum enforce that
//! here.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use lc_common::access::Role;
use lc_common::models::{Curriculum, CurriculumVideo, Visibility};

use crate::AppState;

use super::{ApiError, CurrentSession};

#[derive(Debug, Deserialize)]
pub struct CurriculumRequest {
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
}

#[derive(Debug, Deserialize)]
pub struct AddVideoRequest {
    pub video_id: String,
    /// Optional caller-supplied metadata; missing fields are resolved via
    /// the oEmbed integration
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub channel: Option<String>,
}

/// GET /api/curricula - the caller's own curricula
pub async fn list_curricula(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<Curriculum>>, ApiError> {
    let curricula = state
        .store
        .curricula_by_owner(session.identity.user_id)
        .await?;
    Ok(Json(curricula))
}

/// POST /api/curricula
pub async fn create_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<CurriculumRequest>,
) -> Result<Json<Curriculum>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title must not be empty"));
    }

    let curriculum = state
        .store
        .create_curriculum(
            session.identity.user_id,
            body.title.trim(),
            &body.description,
            body.visibility,
        )
        .await?;
    Ok(Json(curriculum))
}

/// Visibility rules for reading someone else's curriculum
fn may_read(curriculum: &Curriculum, session: &CurrentSession) -> bool {
    if curriculum.owner_id == session.identity.user_id || session.identity.role == Role::Admin {
        return true;
    }
    match curriculum.visibility {
        Visibility::Public => true,
        Visibility::Team => false, // refined below with the owner's team
        Visibility::Private => false,
    }
}

/// GET /api/curricula/:id
pub async fn get_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Curriculum>, ApiError> {
    let curriculum = state
        .store
        .curriculum(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Curriculum not found"))?;

    if may_read(&curriculum, &session) {
        return Ok(Json(curriculum));
    }

    // Team visibility: readable when owner and caller share a team
    if curriculum.visibility == Visibility::Team {
        let owner_team = state
            .store
            .profile(curriculum.owner_id)
            .await?
            .and_then(|p| p.team_id);
        if owner_team.is_some() && owner_team == session.identity.team_id {
            return Ok(Json(curriculum));
        }
    }

    Err(ApiError::forbidden("Permission required"))
}

async fn owned_curriculum(
    state: &AppState,
    session: &CurrentSession,
    id: Uuid,
) -> Result<Curriculum, ApiError> {
    let curriculum = state
        .store
        .curriculum(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Curriculum not found"))?;

    if curriculum.owner_id != session.identity.user_id {
        return Err(ApiError::forbidden("Not the curriculum owner"));
    }
    Ok(curriculum)
}

/// PUT /api/curricula/:id
pub async fn update_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<CurriculumRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title must not be empty"));
    }

    let curriculum = owned_curriculum(&state, &session, id).await?;

    state
        .store
        .update_curriculum(
            curriculum.id,
            curriculum.owner_id,
            body.title.trim(),
            &body.description,
            body.visibility,
        )
        .await?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

/// DELETE /api/curricula/:id
pub async fn delete_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let curriculum = owned_curriculum(&state, &session, id).await?;
    state
        .store
        .delete_curriculum(curriculum.id, curriculum.owner_id)
        .await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// POST /api/curricula/:id/videos
///
/// Metadata gaps are filled from the oEmbed integration (best effort,
/// placeholders on failure).
pub async fn add_video(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddVideoRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let curriculum = owned_curriculum(&state, &session, id).await?;

    if body.video_id.trim().is_empty() {
        return Err(ApiError::bad_request("video_id must not be empty"));
    }

    let needs_lookup = body.title.is_none() || body.thumbnail_url.is_none();
    let embed = if needs_lookup {
        Some(state.youtube.oembed(&body.video_id).await)
    } else {
        None
    };

    let video = CurriculumVideo {
        video_id: body.video_id.clone(),
        title: body
            .title
            .or_else(|| embed.as_ref().map(|e| e.title.clone()))
            .unwrap_or_default(),
        thumbnail_url: body
            .thumbnail_url
            .or_else(|| embed.as_ref().map(|e| e.thumbnail.clone()))
            .unwrap_or_default(),
        duration_seconds: body.duration_seconds.unwrap_or(0),
        channel: body
            .channel
            .or_else(|| embed.as_ref().map(|e| e.author.clone()))
            .unwrap_or_default(),
        position: 0, // assigned by the store
        completed: false,
    };

    state
        .store
        .add_video(curriculum.id, curriculum.owner_id, &video)
        .await?;
    Ok(Json(serde_json::json!({ "status": "added" })))
}

/// POST /api/curricula/:id/videos/:video_id/complete
pub async fn complete_video(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path((id, video_id)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let curriculum = owned_curriculum(&state, &session, id).await?;
    state
        .store
        .set_video_completed(curriculum.id, curriculum.owner_id, &video_id, true)
        .await?;
    Ok(Json(serde_json::json!({ "status": "completed" })))
}
