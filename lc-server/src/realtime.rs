//! Per-session realtime state aggregation
//!
//! Each authenticated session owns one [`RealtimeAggregator`] task that
//! mirrors four store slices into local state:
//!
//! - curricula owned by the session's user
//! - the user's notifications
//! - the user's profile
//! - the user's team (one-shot fetch, contingent on the profile)
//!
//! The task subscribes to the change-event bus, re-snapshots a slice
//! whenever a matching event arrives (replace-whole-value, never patched),
//! and publishes read-only views through a watch channel. Only this task
//! ever mutates the slices.
//!
//! # Team fetch ordering
//!
//! Profile deliveries can supersede each other while a team fetch is still
//! in flight. Every fetch is tagged with a generation taken when it was
//! triggered; resolutions re-enter the task as internal messages and are
//! discarded unless their generation is still the latest. A stale fetch can
//! therefore never overwrite a newer team reference, regardless of
//! resolution order. A fetch failure at the latest generation leaves the
//! team slice absent rather than keeping data from an older reference.
//!
//! # Teardown
//!
//! [`RealtimeHandle::shutdown`] resolves only after the task has exited.
//! The task publishes a final reset (all slices empty/absent) before
//! terminating, so nothing mutates after shutdown returns and the bus
//! subscription is provably released.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use lc_common::access::SessionIdentity;
use lc_common::events::{EventBus, LcEvent};
use lc_common::models::{Curriculum, Notification, TeamProfile, UserProfile};

use crate::db::SnapshotSource;

/// The four mirrored slices of one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSlices {
    pub curricula: Vec<Curriculum>,
    pub notifications: Vec<Notification>,
    pub profile: Option<UserProfile>,
    pub team: Option<TeamProfile>,
}

impl SessionSlices {
    /// Count of unread notifications
    ///
    /// Derived on demand from the notifications slice; never stored, so it
    /// cannot go stale.
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// Messages the aggregator task sends itself
enum Internal {
    /// A one-shot team fetch resolved
    TeamFetched {
        generation: u64,
        team: Option<TeamProfile>,
    },
}

/// Owning handle for one session's aggregator
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) aborts
/// the task on the next loop turn (the shutdown channel closes), but only
/// `shutdown` guarantees the final reset has been published before it
/// returns.
pub struct RealtimeHandle {
    slices: watch::Receiver<SessionSlices>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    /// A read-only view of the session's slices
    pub fn slices(&self) -> watch::Receiver<SessionSlices> {
        self.slices.clone()
    }

    /// Tear the aggregator down
    ///
    /// Resolves after the task has exited; the last published value is the
    /// empty/absent reset.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

/// Spawn the aggregator for one authenticated session
///
/// The bus subscription is opened before the initial snapshots are loaded,
/// so a write landing between snapshot and subscription is still observed
/// as a change event.
pub fn spawn<S: SnapshotSource>(
    identity: SessionIdentity,
    source: Arc<S>,
    bus: &EventBus,
) -> RealtimeHandle {
    let events = bus.subscribe();
    let (slices_tx, slices_rx) = watch::channel(SessionSlices::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (internal_tx, internal_rx) = mpsc::channel(8);

    let aggregator = RealtimeAggregator {
        user_id: identity.user_id,
        source,
        slices: SessionSlices::default(),
        slices_tx,
        internal_tx,
        team_generation: 0,
    };

    let task = tokio::spawn(aggregator.run(events, internal_rx, shutdown_rx));

    RealtimeHandle {
        slices: slices_rx,
        shutdown_tx,
        task,
    }
}

struct RealtimeAggregator<S: SnapshotSource> {
    user_id: Uuid,
    source: Arc<S>,
    slices: SessionSlices,
    slices_tx: watch::Sender<SessionSlices>,
    internal_tx: mpsc::Sender<Internal>,
    /// Generation of the most recently triggered team fetch
    team_generation: u64,
}

impl<S: SnapshotSource> RealtimeAggregator<S> {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<LcEvent>,
        mut internal: mpsc::Receiver<Internal>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        debug!(user_id = %self.user_id, "Realtime aggregator started");

        self.resync_all().await;
        self.publish();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                msg = internal.recv() => {
                    // The task holds a sender clone, so recv never yields None
                    if let Some(msg) = msg {
                        self.handle_internal(msg);
                    }
                }

                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            user_id = %self.user_id,
                            skipped, "Change bus lagged; re-snapshotting all slices"
                        );
                        self.resync_all().await;
                        self.publish();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        // Final reset: slices must read as empty/absent once the session
        // is gone, and nothing may mutate after shutdown() returns.
        self.slices = SessionSlices::default();
        self.publish();
        debug!(user_id = %self.user_id, "Realtime aggregator stopped");
    }

    fn publish(&self) {
        self.slices_tx.send_replace(self.slices.clone());
    }

    async fn handle_event(&mut self, event: LcEvent) {
        match event {
            LcEvent::CurriculaChanged { owner_id } if owner_id == self.user_id => {
                self.reload_curricula().await;
                self.publish();
            }
            LcEvent::NotificationsChanged { user_id } if user_id == self.user_id => {
                self.reload_notifications().await;
                self.publish();
            }
            LcEvent::ProfileChanged { user_id } if user_id == self.user_id => {
                self.reload_profile().await;
                self.trigger_team_fetch();
                self.publish();
            }
            LcEvent::TeamChanged { team_id }
                if self.current_team_ref() == Some(team_id) =>
            {
                // Refresh the one-shot slice; same generation discipline as
                // profile-triggered fetches
                self.trigger_team_fetch();
            }
            _ => {}
        }
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::TeamFetched { generation, team } => {
                if generation != self.team_generation {
                    debug!(
                        user_id = %self.user_id,
                        generation, latest = self.team_generation,
                        "Discarding stale team fetch"
                    );
                    return;
                }
                self.slices.team = team;
                self.publish();
            }
        }
    }

    fn current_team_ref(&self) -> Option<Uuid> {
        self.slices.profile.as_ref().and_then(|p| p.team_id)
    }

    /// Start a one-shot team fetch for the current profile's team reference
    ///
    /// Always bumps the generation, so an in-flight fetch for a previous
    /// reference (including a removed one) can no longer land.
    fn trigger_team_fetch(&mut self) {
        self.team_generation += 1;
        let generation = self.team_generation;

        let Some(team_id) = self.current_team_ref() else {
            self.slices.team = None;
            return;
        };

        let source = Arc::clone(&self.source);
        let tx = self.internal_tx.clone();
        let user_id = self.user_id;
        tokio::spawn(async move {
            let team = match source.team_snapshot(team_id).await {
                Ok(team) => team,
                Err(e) => {
                    warn!(%user_id, %team_id, "Team fetch failed: {}", e);
                    None
                }
            };
            // Receiver gone means the session ended; nothing to deliver to
            let _ = tx.send(Internal::TeamFetched { generation, team }).await;
        });
    }

    async fn resync_all(&mut self) {
        self.reload_curricula().await;
        self.reload_notifications().await;
        self.reload_profile().await;
        self.trigger_team_fetch();
    }

    // Snapshot errors keep the previous slice: stale data beats clearing a
    // working view on a transient store failure.

    async fn reload_curricula(&mut self) {
        match self.source.curricula_snapshot(self.user_id).await {
            Ok(curricula) => self.slices.curricula = curricula,
            Err(e) => warn!(user_id = %self.user_id, "Curricula snapshot failed: {}", e),
        }
    }

    async fn reload_notifications(&mut self) {
        match self.source.notifications_snapshot(self.user_id).await {
            Ok(notifications) => self.slices.notifications = notifications,
            Err(e) => warn!(user_id = %self.user_id, "Notifications snapshot failed: {}", e),
        }
    }

    async fn reload_profile(&mut self) {
        match self.source.profile_snapshot(self.user_id).await {
            Ok(profile) => self.slices.profile = profile,
            Err(e) => warn!(user_id = %self.user_id, "Profile snapshot failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lc_common::models::NotificationKind;

    fn notification(read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::System,
            body: "hello".to_string(),
            read,
            related_team: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unread_count_counts_only_unread() {
        let slices = SessionSlices {
            notifications: vec![notification(false), notification(true), notification(false)],
            ..Default::default()
        };
        assert_eq!(slices.unread_count(), 2);
    }

    #[test]
    fn test_unread_count_moves_by_one_on_toggle() {
        let mut slices = SessionSlices {
            notifications: vec![notification(false), notification(true)],
            ..Default::default()
        };
        let before = slices.unread_count();

        slices.notifications[0].read = true;
        assert_eq!(slices.unread_count(), before - 1);

        slices.notifications[1].read = false;
        assert_eq!(slices.unread_count(), before);
    }

    #[test]
    fn test_default_slices_are_empty() {
        let slices = SessionSlices::default();
        assert!(slices.curricula.is_empty());
        assert!(slices.notifications.is_empty());
        assert!(slices.profile.is_none());
        assert!(slices.team.is_none());
        assert_eq!(slices.unread_count(), 0);
    }
}
