//! Server-Sent Events stream of the session's realtime slices
//!
//! Each connected client receives the full slice snapshot (plus the
//! derived unread count) immediately, then again whenever the session's
//! aggregator publishes a change, with heartbeats in between.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Extension;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

use crate::AppState;

use super::{ApiError, CurrentSession};

fn snapshot_event(slices: &crate::realtime::SessionSlices) -> Event {
    let payload = serde_json::json!({
        "curricula": slices.curricula,
        "notifications": slices.notifications,
        "profile": slices.profile,
        "team": slices.team,
        "unread_count": slices.unread_count(),
    });
    Event::default()
        .event("Snapshot")
        .data(payload.to_string())
}

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut slices = state
        .sessions
        .slices(&session.token)
        .await
        .ok_or_else(|| ApiError::unauthorized("Session has no live state"))?;

    info!(user_id = %session.identity.user_id, "New SSE client connected");

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        // Initial snapshot, then one event per published change
        let initial = slices.borrow_and_update().clone();
        yield Ok(snapshot_event(&initial));

        loop {
            tokio::select! {
                changed = slices.changed() => {
                    if changed.is_err() {
                        // Aggregator gone: session ended
                        debug!("SSE: slice publisher dropped, closing stream");
                        break;
                    }
                    let snapshot = slices.borrow_and_update().clone();
                    yield Ok(snapshot_event(&snapshot));
                }
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
