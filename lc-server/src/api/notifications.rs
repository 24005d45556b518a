//! Notification endpoints

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use lc_common::models::Notification;

use crate::AppState;

use super::{ApiError, CurrentSession};

/// GET /api/notifications - the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state
        .store
        .notifications_for(session.identity.user_id)
        .await?;
    Ok(Json(notifications))
}

async fn set_read(
    state: &AppState,
    session: &CurrentSession,
    id: Uuid,
    read: bool,
) -> Result<(), ApiError> {
    // set_notification_read scopes by user_id, so a foreign id is a 404
    // rather than leaking another user's notification
    state
        .store
        .set_notification_read(id, session.identity.user_id, read)
        .await?;
    Ok(())
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    set_read(&state, &session, id, true).await?;
    Ok(Json(serde_json::json!({ "status": "read" })))
}

/// POST /api/notifications/:id/unread
pub async fn mark_unread(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    set_read(&state, &session, id, false).await?;
    Ok(Json(serde_json::json!({ "status": "unread" })))
}
