//! Authentication: register/login/logout handlers and session middleware
//!
//! Protected routes carry `Authorization: Bearer <token>`. The middleware
//! resolves the token to a fresh [`SessionIdentity`] on every request and
//! attaches it (plus the raw token, needed by logout and the SSE stream)
//! as a request extension. Denied access renders a JSON error body and
//! never an exception; absent credentials are a 401, an authenticated but
//! unpermitted identity a 403.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use lc_common::access::{evaluate_access, AccessRequirement, Role, SessionIdentity};
use lc_common::Error;

use crate::permissions::PermissionMatrix;
use crate::session::{generate_salt, hash_password, verify_password};
use crate::AppState;

use super::ApiError;

/// Authenticated request context inserted by the middleware
#[derive(Clone)]
pub struct CurrentSession {
    pub identity: SessionIdentity,
    pub token: String,
}

/// Session middleware for protected routes
///
/// Health and the auth entry points do NOT pass through here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?
        .to_string();

    let identity = state
        .sessions
        .authenticate(&token)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request
        .extensions_mut()
        .insert(CurrentSession { identity, token });

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Role gate for the admin router
///
/// Runs after `auth_middleware`, so the session extension is present.
pub async fn admin_guard(
    Extension(session): Extension<CurrentSession>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let decision = evaluate_access(
        Some(&session.identity),
        &AccessRequirement::Roles(vec![Role::Admin]),
        &PermissionMatrix,
    );
    if !decision.is_allowed() {
        return Err(ApiError::forbidden("Permission required"));
    }
    Ok(next.run(request).await)
}

/// Evaluate an access requirement for the current identity, 403 on deny
pub fn require(state: &AppState, session: &CurrentSession, requirement: &AccessRequirement) -> Result<(), ApiError> {
    let decision = evaluate_access(Some(&session.identity), requirement, &state.permissions);
    if decision.is_allowed() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Permission required"))
    }
}

// ========================================
// Handlers
// ========================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub identity: SessionIdentity,
}

/// POST /api/auth/register
///
/// Creates the account, then logs it straight in. The very first account
/// on a fresh install becomes the admin; everyone after starts as a
/// plain user.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if body.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if !body.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&salt, &body.password);

    let role = if state.store.user_count().await? == 0 {
        Role::Admin
    } else {
        Role::User
    };

    let profile = state
        .store
        .create_user(&body.display_name, &body.email, &salt, &password_hash, role)
        .await?;

    let token = state.sessions.login(&profile).await?;
    info!(user_id = %profile.user_id, "User registered");

    Ok(Json(LoginResponse {
        token,
        identity: SessionIdentity {
            user_id: profile.user_id,
            role: profile.role,
            team_id: profile.team_id,
        },
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let row = state
        .store
        .user_by_email(&body.email)
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid credentials".to_string()))?;

    verify_password(&row.password_salt, &row.password_hash, &body.password)?;

    let token = state.sessions.login(&row.profile).await?;
    info!(user_id = %row.profile.user_id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        identity: SessionIdentity {
            user_id: row.profile.user_id,
            role: row.profile.role,
            team_id: row.profile.team_id,
        },
    }))
}

/// POST /api/auth/logout
///
/// Revokes the session and tears its aggregator down before responding;
/// once the response is sent there are zero live subscriptions for it.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.sessions.logout(&session.token).await?;
    Ok(Json(serde_json::json!({ "status": "logged_out" })))
}
