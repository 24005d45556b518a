//! Change events for the data store
//!
//! Every write path in the server emits one of these events on the shared
//! [`EventBus`]. The realtime aggregator subscribes per session and
//! re-reads the affected slice when an event for its owner arrives. This
//! is the subscription mechanism: deliveries are FIFO per bus receiver,
//! and nothing is ordered across independent topics.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Store change notifications
///
/// Events carry owner identifiers only, never payloads: subscribers
/// re-snapshot the slice. Replace-whole-value semantics fall out of that
/// naturally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LcEvent {
    /// Any curriculum owned by this user was created, updated or deleted
    CurriculaChanged { owner_id: Uuid },

    /// This user's notification list changed (new entry, read flag toggle)
    NotificationsChanged { user_id: Uuid },

    /// This user's profile row changed (role, team membership, display name)
    ProfileChanged { user_id: Uuid },

    /// Team data changed (members, announcements, settings)
    TeamChanged { team_id: Uuid },
}

/// Central change-event distribution bus
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block writers)
/// - Multiple concurrent subscribers (one per live session)
/// - Automatic cleanup when subscribers drop
///
/// Events emitted before a subscription exist are not delivered to it;
/// subscribers load an initial snapshot first, then apply changes.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LcEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity
    ///
    /// A lagged receiver drops the oldest buffered events; the aggregator
    /// recovers by re-snapshotting, so a modest capacity is enough.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future change events
    pub fn subscribe(&self) -> broadcast::Receiver<LcEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Writes must succeed whether or not any session is live, so the
    /// no-subscriber case is not an error.
    pub fn emit(&self, event: LcEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers
    ///
    /// One per active session aggregator; used to verify teardown.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        bus.emit(LcEvent::CurriculaChanged {
            owner_id: Uuid::new_v4(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let user = Uuid::new_v4();
        bus.emit(LcEvent::NotificationsChanged { user_id: user });
        bus.emit(LcEvent::ProfileChanged { user_id: user });

        assert_eq!(
            rx.recv().await.unwrap(),
            LcEvent::NotificationsChanged { user_id: user }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            LcEvent::ProfileChanged { user_id: user }
        );
    }

    #[tokio::test]
    async fn test_receiver_count_tracks_drops() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);

        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
