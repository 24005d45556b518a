//! Admin endpoints: user management and content moderation
//!
//! The whole router is gated on the admin role by a middleware layer in
//! `build_router`; handlers still re-check the specific permission so a
//! wiring mistake fails closed instead of open.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use lc_common::access::{AccessRequirement, Role};
use lc_common::models::{ApprovalStatus, Curriculum, NotificationKind, UserProfile};

use crate::AppState;

use super::auth::require;
use super::{ApiError, CurrentSession};

fn admin_permission(action: &str) -> AccessRequirement {
    AccessRequirement::Permission {
        resource: "admin".to_string(),
        action: action.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    require(&state, &session, &admin_permission("users"))?;
    Ok(Json(state.store.list_users().await?))
}

/// PUT /api/admin/users/:id/role
pub async fn set_user_role(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&state, &session, &admin_permission("users"))?;

    if id == session.identity.user_id && body.role != Role::Admin {
        return Err(ApiError::bad_request("Cannot demote yourself"));
    }

    state.store.set_role(id, body.role).await?;
    info!(user_id = %id, role = body.role.as_str(), "Role changed");
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&state, &session, &admin_permission("users"))?;

    if id == session.identity.user_id {
        return Err(ApiError::bad_request("Cannot delete yourself"));
    }

    // Revoke sessions (and their aggregators) before the rows disappear
    state.sessions.revoke_user(id).await?;
    state.store.delete_user(id).await?;
    info!(user_id = %id, "User deleted");
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// GET /api/admin/moderation/pending
pub async fn pending_curricula(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<Curriculum>>, ApiError> {
    require(&state, &session, &admin_permission("moderation"))?;
    Ok(Json(state.store.pending_curricula().await?))
}

async fn moderate(
    state: &AppState,
    session: &CurrentSession,
    id: Uuid,
    approval: ApprovalStatus,
    message: &str,
) -> Result<(), ApiError> {
    require(state, session, &admin_permission("moderation"))?;

    let owner_id = state.store.set_approval(id, approval).await?;
    state
        .store
        .create_notification(owner_id, NotificationKind::Moderation, message, None)
        .await?;
    Ok(())
}

/// POST /api/admin/moderation/:id/approve
pub async fn approve_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    moderate(
        &state,
        &session,
        id,
        ApprovalStatus::Approved,
        "Your curriculum was approved",
    )
    .await?;
    Ok(Json(serde_json::json!({ "status": "approved" })))
}

/// POST /api/admin/moderation/:id/reject
pub async fn reject_curriculum(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    moderate(
        &state,
        &session,
        id,
        ApprovalStatus::Rejected,
        "Your curriculum was rejected",
    )
    .await?;
    Ok(Json(serde_json::json!({ "status": "rejected" })))
}
