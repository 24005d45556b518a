//! Integration tests for the per-session realtime aggregator
//!
//! Covers:
//! - Initial snapshot loading and change propagation via the event bus
//! - Whole-value replace semantics for each slice
//! - Stale team-fetch discard (latest reference wins regardless of
//!   resolution order)
//! - Teardown: zero live subscriptions, all slices reset

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use lc_common::access::{Role, SessionIdentity};
use lc_common::events::{EventBus, LcEvent};
use lc_common::models::{
    Curriculum, Notification, NotificationKind, TeamProfile, TeamSettings, UserProfile,
};
use lc_common::Result;
use lc_server::db::{self, SnapshotSource, Store};
use lc_server::realtime::{self, SessionSlices};

fn identity(user_id: Uuid) -> SessionIdentity {
    SessionIdentity {
        user_id,
        role: Role::User,
        team_id: None,
    }
}

/// Wait until the published slices satisfy a predicate
async fn wait_for(
    rx: &mut watch::Receiver<SessionSlices>,
    what: &str,
    pred: impl Fn(&SessionSlices) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if pred(&rx.borrow()) {
                return;
            }
            rx.changed().await.expect("slice publisher dropped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {}", what));
}

async fn store_with_user(display_name: &str) -> (Store, Uuid) {
    let pool = db::connect_in_memory().await.expect("in-memory db");
    let store = Store::new(pool, EventBus::new(64));
    let profile = store
        .create_user(display_name, &format!("{}@test", display_name), "salt", "hash", Role::User)
        .await
        .expect("create user");
    (store, profile.user_id)
}

// =============================================================================
// Snapshot loading and change propagation
// =============================================================================

#[tokio::test]
async fn test_initial_snapshots_loaded() {
    let (store, user_id) = store_with_user("alma").await;
    store
        .create_curriculum(user_id, "Rust basics", "", lc_common::models::Visibility::Private)
        .await
        .unwrap();
    store
        .create_notification(user_id, NotificationKind::System, "welcome", None)
        .await
        .unwrap();

    let handle = realtime::spawn(
        identity(user_id),
        std::sync::Arc::new(store.clone()),
        store.bus(),
    );
    let mut rx = handle.slices();

    wait_for(&mut rx, "initial snapshots", |s| {
        s.curricula.len() == 1 && s.notifications.len() == 1 && s.profile.is_some()
    })
    .await;

    let slices = rx.borrow().clone();
    assert_eq!(slices.curricula[0].title, "Rust basics");
    assert_eq!(slices.unread_count(), 1);
    assert!(slices.team.is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_writes_propagate_to_slices() {
    let (store, user_id) = store_with_user("bela").await;

    let handle = realtime::spawn(
        identity(user_id),
        std::sync::Arc::new(store.clone()),
        store.bus(),
    );
    let mut rx = handle.slices();
    wait_for(&mut rx, "initial profile", |s| s.profile.is_some()).await;

    // A write after spawn must arrive through the change bus
    let notification = store
        .create_notification(user_id, NotificationKind::System, "ping", None)
        .await
        .unwrap();
    wait_for(&mut rx, "new notification", |s| s.notifications.len() == 1).await;
    assert_eq!(rx.borrow().unread_count(), 1);

    // Toggling the read flag replaces the slice and moves the count by one
    store
        .set_notification_read(notification.id, user_id, true)
        .await
        .unwrap();
    wait_for(&mut rx, "read flag", |s| s.unread_count() == 0).await;
    assert_eq!(rx.borrow().notifications.len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_other_users_changes_are_ignored() {
    let (store, user_id) = store_with_user("cili").await;
    let other = store
        .create_user("other", "other@test", "salt", "hash", Role::User)
        .await
        .unwrap();

    let handle = realtime::spawn(
        identity(user_id),
        std::sync::Arc::new(store.clone()),
        store.bus(),
    );
    let mut rx = handle.slices();
    wait_for(&mut rx, "initial profile", |s| s.profile.is_some()).await;

    store
        .create_notification(other.user_id, NotificationKind::System, "not yours", None)
        .await
        .unwrap();
    // Give the event time to be (not) applied
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.borrow().notifications.is_empty());

    handle.shutdown().await;
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_shutdown_resets_slices_and_releases_subscription() {
    let (store, user_id) = store_with_user("dora").await;
    store
        .create_notification(user_id, NotificationKind::System, "hello", None)
        .await
        .unwrap();

    let bus = store.bus().clone();
    let baseline = bus.receiver_count();

    let handle = realtime::spawn(
        identity(user_id),
        std::sync::Arc::new(store.clone()),
        store.bus(),
    );
    let mut rx = handle.slices();
    wait_for(&mut rx, "initial snapshots", |s| !s.notifications.is_empty()).await;
    assert_eq!(bus.receiver_count(), baseline + 1);

    handle.shutdown().await;

    // Subscription released, and the final published value is the reset
    assert_eq!(bus.receiver_count(), baseline);
    let slices = rx.borrow().clone();
    assert!(slices.curricula.is_empty());
    assert!(slices.notifications.is_empty());
    assert!(slices.profile.is_none());
    assert!(slices.team.is_none());
}

// =============================================================================
// Team fetch ordering
// =============================================================================

/// Scripted snapshot source: profile is settable, team fetches resolve
/// after a per-team delay
struct ScriptedSource {
    profile: Mutex<Option<UserProfile>>,
    teams: Mutex<HashMap<Uuid, (Duration, TeamProfile)>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            profile: Mutex::new(None),
            teams: Mutex::new(HashMap::new()),
        }
    }

    fn set_profile(&self, profile: Option<UserProfile>) {
        *self.profile.lock().unwrap() = profile;
    }

    fn add_team(&self, team: TeamProfile, delay: Duration) {
        self.teams.lock().unwrap().insert(team.team_id, (delay, team));
    }
}

impl SnapshotSource for ScriptedSource {
    fn curricula_snapshot(&self, _: Uuid) -> impl Future<Output = Result<Vec<Curriculum>>> + Send {
        async { Ok(Vec::new()) }
    }

    fn notifications_snapshot(
        &self,
        _: Uuid,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send {
        async { Ok(Vec::new()) }
    }

    fn profile_snapshot(
        &self,
        _: Uuid,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send {
        let profile = self.profile.lock().unwrap().clone();
        async move { Ok(profile) }
    }

    fn team_snapshot(
        &self,
        team_id: Uuid,
    ) -> impl Future<Output = Result<Option<TeamProfile>>> + Send {
        let entry = self.teams.lock().unwrap().get(&team_id).cloned();
        async move {
            match entry {
                Some((delay, team)) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(team))
                }
                None => Ok(None),
            }
        }
    }
}

fn profile_with_team(user_id: Uuid, team_id: Option<Uuid>) -> UserProfile {
    UserProfile {
        user_id,
        display_name: "scripted".to_string(),
        email: "scripted@test".to_string(),
        role: Role::User,
        team_id,
        created_at: Utc::now(),
    }
}

fn team(name: &str) -> TeamProfile {
    TeamProfile {
        team_id: Uuid::new_v4(),
        name: name.to_string(),
        leader_id: Uuid::new_v4(),
        description: String::new(),
        announcements: Vec::new(),
        member_count: 1,
        settings: TeamSettings::default(),
    }
}

#[tokio::test]
async fn test_stale_team_fetch_never_overwrites_newer_reference() {
    let user_id = Uuid::new_v4();
    let bus = EventBus::new(64);
    let source = std::sync::Arc::new(ScriptedSource::new());

    let team_a = team("Team A");
    let team_b = team("Team B");
    // A resolves slowly, B quickly: A's resolution arrives AFTER B's even
    // though A was triggered first
    source.add_team(team_a.clone(), Duration::from_millis(300));
    source.add_team(team_b.clone(), Duration::from_millis(20));
    source.set_profile(Some(profile_with_team(user_id, Some(team_a.team_id))));

    let handle = realtime::spawn(identity(user_id), std::sync::Arc::clone(&source), &bus);
    let mut rx = handle.slices();
    wait_for(&mut rx, "profile with team A", |s| s.profile.is_some()).await;

    // Supersede A with B while A's fetch is still in flight
    source.set_profile(Some(profile_with_team(user_id, Some(team_b.team_id))));
    bus.emit(LcEvent::ProfileChanged { user_id });

    wait_for(&mut rx, "team B", |s| {
        s.team.as_ref().map(|t| t.team_id) == Some(team_b.team_id)
    })
    .await;

    // Wait past A's resolution; B must still be the visible team
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        rx.borrow().team.as_ref().map(|t| t.team_id),
        Some(team_b.team_id),
        "stale fetch for team A overwrote team B"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_leaving_team_clears_slice_despite_inflight_fetch() {
    let user_id = Uuid::new_v4();
    let bus = EventBus::new(64);
    let source = std::sync::Arc::new(ScriptedSource::new());

    let team_a = team("Team A");
    source.add_team(team_a.clone(), Duration::from_millis(300));
    source.set_profile(Some(profile_with_team(user_id, Some(team_a.team_id))));

    let handle = realtime::spawn(identity(user_id), std::sync::Arc::clone(&source), &bus);
    let mut rx = handle.slices();
    wait_for(&mut rx, "profile", |s| s.profile.is_some()).await;

    // Leave the team before A's fetch resolves
    source.set_profile(Some(profile_with_team(user_id, None)));
    bus.emit(LcEvent::ProfileChanged { user_id });

    wait_for(&mut rx, "team reference cleared", |s| {
        s.profile.as_ref().is_some_and(|p| p.team_id.is_none())
    })
    .await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        rx.borrow().team.is_none(),
        "in-flight fetch repopulated an abandoned team reference"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_team_changed_event_refreshes_team_slice() {
    let user_id = Uuid::new_v4();
    let bus = EventBus::new(64);
    let source = std::sync::Arc::new(ScriptedSource::new());

    let mut team_a = team("Team A");
    source.add_team(team_a.clone(), Duration::from_millis(5));
    source.set_profile(Some(profile_with_team(user_id, Some(team_a.team_id))));

    let handle = realtime::spawn(identity(user_id), std::sync::Arc::clone(&source), &bus);
    let mut rx = handle.slices();
    wait_for(&mut rx, "team A", |s| s.team.is_some()).await;

    // Mutate the team server-side and announce it
    team_a.name = "Team A renamed".to_string();
    source.add_team(team_a.clone(), Duration::from_millis(5));
    bus.emit(LcEvent::TeamChanged {
        team_id: team_a.team_id,
    });

    wait_for(&mut rx, "renamed team", |s| {
        s.team.as_ref().map(|t| t.name.as_str()) == Some("Team A renamed")
    })
    .await;

    handle.shutdown().await;
}
