//! Current-user profile endpoint

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use lc_common::models::UserProfile;

use crate::AppState;

use super::{ApiError, CurrentSession};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub profile: UserProfile,
    pub unread_notifications: usize,
}

/// GET /api/me
///
/// Profile plus the derived unread count, read from the session's live
/// slices when the aggregator has them, falling back to the store while
/// the initial snapshots are still loading.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<MeResponse>, ApiError> {
    if let Some(slices) = state.sessions.slices(&session.token).await {
        let snapshot = slices.borrow().clone();
        let unread = snapshot.unread_count();
        if let Some(profile) = snapshot.profile {
            return Ok(Json(MeResponse {
                profile,
                unread_notifications: unread,
            }));
        }
    }

    let profile = state
        .store
        .profile(session.identity.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    let unread = state
        .store
        .notifications_for(session.identity.user_id)
        .await?
        .iter()
        .filter(|n| !n.read)
        .count();

    Ok(Json(MeResponse {
        profile,
        unread_notifications: unread,
    }))
}
