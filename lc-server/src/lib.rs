//! lc-server library - LifeCurriculum web service
//!
//! Personal and team learning curricula built from YouTube videos, with
//! role-gated APIs, per-session realtime state, and admin moderation.

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod db;
pub mod permissions;
pub mod realtime;
pub mod session;
pub mod youtube;

use db::Store;
use permissions::PermissionMatrix;
use session::SessionManager;
use youtube::YouTubeClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: SessionManager,
    pub youtube: YouTubeClient,
    pub permissions: PermissionMatrix,
}

impl AppState {
    pub fn new(store: Store, youtube: YouTubeClient) -> Self {
        let sessions = SessionManager::new(store.clone());
        Self {
            store,
            sessions,
            youtube,
            permissions: PermissionMatrix,
        }
    }
}

/// Build application router
///
/// Three tiers: public (health, build info, register/login), session
/// (bearer-token middleware), and admin (session middleware plus an
/// admin-role gate).
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin/users", get(api::admin::list_users))
        .route("/api/admin/users/:id/role", put(api::admin::set_user_role))
        .route("/api/admin/users/:id", delete(api::admin::delete_user))
        .route(
            "/api/admin/moderation/pending",
            get(api::admin::pending_curricula),
        )
        .route(
            "/api/admin/moderation/:id/approve",
            post(api::admin::approve_curriculum),
        )
        .route(
            "/api/admin/moderation/:id/reject",
            post(api::admin::reject_curriculum),
        )
        .layer(middleware::from_fn(api::auth::admin_guard));

    // Session-authenticated routes
    let protected = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/me", get(api::profile::get_me))
        .route("/api/events", get(api::sse::event_stream))
        .route(
            "/api/curricula",
            get(api::curricula::list_curricula).post(api::curricula::create_curriculum),
        )
        .route(
            "/api/curricula/:id",
            get(api::curricula::get_curriculum)
                .put(api::curricula::update_curriculum)
                .delete(api::curricula::delete_curriculum),
        )
        .route("/api/curricula/:id/videos", post(api::curricula::add_video))
        .route(
            "/api/curricula/:id/videos/:video_id/complete",
            post(api::curricula::complete_video),
        )
        .route(
            "/api/notifications",
            get(api::notifications::list_notifications),
        )
        .route(
            "/api/notifications/:id/read",
            post(api::notifications::mark_read),
        )
        .route(
            "/api/notifications/:id/unread",
            post(api::notifications::mark_unread),
        )
        .route("/api/teams", post(api::teams::create_team))
        .route("/api/teams/:id", get(api::teams::get_team))
        .route("/api/teams/:id/invite", post(api::teams::invite))
        .route("/api/teams/:id/accept", post(api::teams::accept_invite))
        .route(
            "/api/teams/:id/announcements",
            post(api::teams::post_announcement),
        )
        .route("/api/teams/:id/settings", put(api::teams::update_settings))
        .route("/api/youtube/search", get(api::youtube::search))
        .route("/api/youtube/oembed", get(api::youtube::oembed))
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/version", get(api::buildinfo::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        // Browser clients are served from a separate origin in development
        .layer(CorsLayer::permissive())
        .with_state(state)
}
