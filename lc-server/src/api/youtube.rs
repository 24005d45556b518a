//! YouTube search and oEmbed proxy endpoints
//!
//! Thin handlers over [`crate::youtube::YouTubeClient`]; failures surface
//! as placeholder payloads, never as HTTP errors.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use lc_common::models::{VideoEmbed, VideoSearchResult};

use crate::AppState;

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct OEmbedQuery {
    pub id: String,
}

/// GET /api/youtube/search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<VideoSearchResult>>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::bad_request("Query must not be empty"));
    }
    Ok(Json(state.youtube.search(query.q.trim()).await))
}

/// GET /api/youtube/oembed?id=
pub async fn oembed(
    State(state): State<AppState>,
    Query(query): Query<OEmbedQuery>,
) -> Result<Json<VideoEmbed>, ApiError> {
    if query.id.trim().is_empty() {
        return Err(ApiError::bad_request("Video id must not be empty"));
    }
    Ok(Json(state.youtube.oembed(query.id.trim()).await))
}
