//! Integration tests for lc-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Registration, login, logout and session teardown
//! - Role gating: user vs admin access to admin routes
//! - Curricula CRUD and moderation flow
//! - Notifications and the derived unread count
//! - Team creation, invite and accept flow

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use lc_common::events::EventBus;
use lc_server::db::{self, Store};
use lc_server::youtube::YouTubeClient;
use lc_server::{build_router, AppState};

/// Test helper: fresh in-memory application state
async fn setup_state() -> AppState {
    let pool = db::connect_in_memory().await.expect("in-memory db");
    let store = Store::new(pool, EventBus::new(64));
    // No API key: YouTube lookups return placeholders, no network traffic
    AppState::new(store, YouTubeClient::new(None))
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, None)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = response.status();
    let body = extract_json(response.into_body()).await;
    (status, body)
}

/// Poll `/api/me` until `pred` holds or two seconds pass.
///
/// The profile and unread count served by `/api/me` come from the
/// session's live aggregator, which applies change events asynchronously.
async fn me_until(state: &AppState, token: &str, pred: impl Fn(&Value) -> bool) -> Value {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    loop {
        let (status, body) = send(state, get("/api/me", Some(token))).await;
        assert_eq!(status, StatusCode::OK);
        if pred(&body) {
            return body;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("/api/me never reached expected state, last: {}", body);
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

/// Register a user and return their bearer token.
///
/// The first registration on a fresh state becomes the admin.
async fn register(state: &AppState, name: &str) -> String {
    let (status, body) = send(
        state,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "display_name": name,
                "email": format!("{}@test.example", name),
                "password": "long enough password",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

// =============================================================================
// Health and public surface
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let state = setup_state().await;
    let (status, body) = send(&state, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lc-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_protected_route_without_token_is_401() {
    let state = setup_state().await;
    let (status, _) = send(&state, get("/api/curricula", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_401() {
    let state = setup_state().await;
    let (status, _) = send(&state, get("/api/curricula", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Registration, login, logout
// =============================================================================

#[tokio::test]
async fn test_first_user_becomes_admin() {
    let state = setup_state().await;
    let admin_token = register(&state, "first").await;
    let user_token = register(&state, "second").await;

    let (status, body) = send(&state, get("/api/me", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["role"], "admin");

    let (status, body) = send(&state, get("/api/me", Some(&user_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["role"], "user");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let state = setup_state().await;
    register(&state, "dupe").await;

    let (status, _) = send(
        &state,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "display_name": "dupe again",
                "email": "dupe@test.example",
                "password": "long enough password",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let state = setup_state().await;
    register(&state, "erno").await;

    let (status, _) = send(
        &state,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "email": "erno@test.example",
                "password": "wrong password",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token_and_tears_down_session() {
    let state = setup_state().await;
    let token = register(&state, "fanni").await;

    assert_eq!(state.sessions.active_sessions().await, 1);
    let baseline = state.store.bus().receiver_count();
    assert!(baseline >= 1);

    let (status, _) = send(
        &state,
        request("POST", "/api/auth/logout", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Zero live aggregators and zero bus subscriptions for the session
    assert_eq!(state.sessions.active_sessions().await, 0);
    assert_eq!(state.store.bus().receiver_count(), 0);

    // The token is dead
    let (status, _) = send(&state, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_replaces_first_session() {
    let state = setup_state().await;
    let first_token = register(&state, "geza").await;

    let (status, body) = send(
        &state,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "email": "geza@test.example",
                "password": "long enough password",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second_token = body["token"].as_str().unwrap().to_string();

    // Exactly one live session: the old one was torn down first
    assert_eq!(state.sessions.active_sessions().await, 1);

    let (status, _) = send(&state, get("/api/me", Some(&first_token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&state, get("/api/me", Some(&second_token))).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Role gating
// =============================================================================

#[tokio::test]
async fn test_user_denied_admin_routes() {
    let state = setup_state().await;
    let _admin = register(&state, "hanna").await;
    let user_token = register(&state, "imre").await;

    let (status, body) = send(&state, get("/api/admin/users", Some(&user_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Permission required");
}

#[tokio::test]
async fn test_admin_allowed_admin_routes() {
    let state = setup_state().await;
    let admin_token = register(&state, "jolan").await;
    register(&state, "kata").await;

    let (status, body) = send(&state, get("/api/admin/users", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

// =============================================================================
// Curricula
// =============================================================================

async fn create_curriculum(state: &AppState, token: &str, title: &str) -> Value {
    let (status, body) = send(
        state,
        request(
            "POST",
            "/api/curricula",
            Some(token),
            Some(json!({
                "title": title,
                "description": "desc",
                "visibility": "private",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create curriculum failed: {}", body);
    body
}

#[tokio::test]
async fn test_curriculum_crud() {
    let state = setup_state().await;
    let token = register(&state, "lili").await;

    let created = create_curriculum(&state, &token, "Ownership and borrowing").await;
    assert_eq!(created["approval"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&state, get("/api/curricula", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Full metadata supplied, so no oEmbed lookup leaves the process
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/curricula/{}/videos", id),
            Some(&token),
            Some(json!({
                "video_id": "dQw4w9WgXcQ",
                "title": "Never Gonna Give You Up",
                "thumbnail_url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
                "duration_seconds": 212,
                "channel": "Rick Astley",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/curricula/{}/videos/dQw4w9WgXcQ/complete", id),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&state, get(&format!("/api/curricula/{}", id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videos"][0]["completed"], true);

    let (status, _) = send(
        &state,
        request("DELETE", &format!("/api/curricula/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, get("/api/curricula", Some(&token))).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_rejects_blank_title() {
    let state = setup_state().await;
    let token = register(&state, "marta").await;

    let created = create_curriculum(&state, &token, "Keep this title").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/curricula/{}", id),
            Some(&token),
            Some(json!({
                "title": "   ",
                "description": "desc",
                "visibility": "private",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&state, get(&format!("/api/curricula/{}", id), Some(&token))).await;
    assert_eq!(body["title"], "Keep this title");
}

#[tokio::test]
async fn test_private_curriculum_hidden_from_others() {
    let state = setup_state().await;
    let _admin = register(&state, "mona").await;
    let owner_token = register(&state, "nora").await;
    let other_token = register(&state, "otto").await;

    let created = create_curriculum(&state, &owner_token, "Secret plan").await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &state,
        get(&format!("/api/curricula/{}", id), Some(&other_token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Moderation
// =============================================================================

#[tokio::test]
async fn test_moderation_approve_notifies_owner() {
    let state = setup_state().await;
    let admin_token = register(&state, "petra").await;
    let owner_token = register(&state, "rita").await;

    let created = create_curriculum(&state, &owner_token, "Pending work").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        get("/api/admin/moderation/pending", Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/admin/moderation/{}/approve", id),
            Some(&admin_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Owner's curriculum is approved and a moderation notification exists
    let (_, body) = send(&state, get("/api/curricula", Some(&owner_token))).await;
    assert_eq!(body[0]["approval"], "approved");

    let (_, body) = send(&state, get("/api/notifications", Some(&owner_token))).await;
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"moderation"));
}

// =============================================================================
// Notifications and unread count
// =============================================================================

#[tokio::test]
async fn test_unread_count_follows_read_flags() {
    let state = setup_state().await;
    let _admin = register(&state, "sara").await;
    let token = register(&state, "tibor").await;

    // Seed three notifications directly through the store
    let me = send(&state, get("/api/me", Some(&token))).await.1;
    let user_id = me["profile"]["user_id"].as_str().unwrap().parse().unwrap();
    for body in ["one", "two", "three"] {
        state
            .store
            .create_notification(user_id, lc_common::models::NotificationKind::System, body, None)
            .await
            .unwrap();
    }

    me_until(&state, &token, |me| me["unread_notifications"] == 3).await;

    let (_, list) = send(&state, get("/api/notifications", Some(&token))).await;
    let first_id = list[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/notifications/{}/read", first_id),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    me_until(&state, &token, |me| me["unread_notifications"] == 2).await;

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/notifications/{}/unread", first_id),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    me_until(&state, &token, |me| me["unread_notifications"] == 3).await;
}

#[tokio::test]
async fn test_cannot_read_other_users_notification() {
    let state = setup_state().await;
    let _admin = register(&state, "ubul").await;
    let a_token = register(&state, "vera").await;
    let b_token = register(&state, "zita").await;

    let me = send(&state, get("/api/me", Some(&a_token))).await.1;
    let a_id = me["profile"]["user_id"].as_str().unwrap().parse().unwrap();
    let notification = state
        .store
        .create_notification(a_id, lc_common::models::NotificationKind::System, "mine", None)
        .await
        .unwrap();

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/notifications/{}/read", notification.id),
            Some(&b_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Teams
// =============================================================================

#[tokio::test]
async fn test_team_invite_and_accept_flow() {
    let state = setup_state().await;
    let _admin = register(&state, "aron").await;
    let leader_token = register(&state, "bence").await;
    let member_token = register(&state, "csilla").await;

    // Found a team; founder is promoted to team_leader
    let (status, body) = send(
        &state,
        request(
            "POST",
            "/api/teams",
            Some(&leader_token),
            Some(json!({ "name": "Rustaceans", "description": "learning rust" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create team failed: {}", body);
    let team_id = body["team_id"].as_str().unwrap().to_string();

    me_until(&state, &leader_token, |me| {
        me["profile"]["role"] == "team_leader"
    })
    .await;

    // A plain member cannot invite
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/invite", team_id),
            Some(&member_token),
            Some(json!({ "email": "csilla@test.example" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The leader invites; invitee gets a team_invite notification
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/invite", team_id),
            Some(&leader_token),
            Some(json!({ "email": "csilla@test.example" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, notifications) = send(&state, get("/api/notifications", Some(&member_token))).await;
    assert_eq!(notifications[0]["kind"], "team_invite");

    // Accepting joins the team
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/accept", team_id),
            Some(&member_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, team) = send(
        &state,
        get(&format!("/api/teams/{}", team_id), Some(&member_token)),
    )
    .await;
    assert_eq!(team["member_count"], 2);
}

#[tokio::test]
async fn test_accept_without_invite_is_forbidden() {
    let state = setup_state().await;
    let _admin = register(&state, "domos").await;
    let leader_token = register(&state, "elza").await;
    let outsider_token = register(&state, "ferko").await;

    let (_, body) = send(
        &state,
        request(
            "POST",
            "/api/teams",
            Some(&leader_token),
            Some(json!({ "name": "Closed club", "description": "" })),
        ),
    )
    .await;
    let team_id = body["team_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/accept", team_id),
            Some(&outsider_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_announcement_respects_team_settings() {
    let state = setup_state().await;
    let _admin = register(&state, "gitta").await;
    let leader_token = register(&state, "hugo").await;
    let member_token = register(&state, "ilka").await;

    let (_, body) = send(
        &state,
        request(
            "POST",
            "/api/teams",
            Some(&leader_token),
            Some(json!({ "name": "Announcers", "description": "" })),
        ),
    )
    .await;
    let team_id = body["team_id"].as_str().unwrap().to_string();

    // Open enrollment so the member can join without an invite
    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/teams/{}/settings", team_id),
            Some(&leader_token),
            Some(json!({ "open_enrollment": true, "announcement_posting": "leader_only" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/accept", team_id),
            Some(&member_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // leader_only: the member may not post
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/announcements", team_id),
            Some(&member_token),
            Some(json!({ "body": "hello team" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The leader may, and members get an announcement notification
    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/announcements", team_id),
            Some(&leader_token),
            Some(json!({ "body": "hello team" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, notifications) = send(&state, get("/api/notifications", Some(&member_token))).await;
    let kinds: Vec<&str> = notifications
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"announcement"));

    // all_members flips the rule
    let (status, _) = send(
        &state,
        request(
            "PUT",
            &format!("/api/teams/{}/settings", team_id),
            Some(&leader_token),
            Some(json!({ "open_enrollment": true, "announcement_posting": "all_members" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        request(
            "POST",
            &format!("/api/teams/{}/announcements", team_id),
            Some(&member_token),
            Some(json!({ "body": "members can post now" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// YouTube proxy
// =============================================================================

#[tokio::test]
async fn test_youtube_search_placeholder_fallback() {
    let state = setup_state().await;
    let _admin = register(&state, "jonas").await;
    let token = register(&state, "klara").await;

    let (status, body) = send(
        &state,
        get("/api/youtube/search?q=rust+lifetimes", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "placeholder");

    let (status, _) = send(&state, get("/api/youtube/search?q=", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
