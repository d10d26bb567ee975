//! Server-Sent Events for batch progress

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    /// Only forward events of this job
    pub job_id: Option<Uuid>,
}

/// GET /api/v1/batch/events
///
/// Streams BatchJobCreated, BatchJobStarted, BatchItemFinished,
/// BatchJobCompleted and BatchJobFailed.
pub async fn batch_event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(job_id = ?filter.job_id, "New SSE client connected to batch events");
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if filter.job_id.is_some_and(|id| id != event.job_id()) {
                continue;
            }

            let event_type = event.event_type();
            match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!("SSE: Broadcasting batch event: {}", event_type);
                    yield Ok(Event::default().event(event_type).data(json));
                }
                Err(e) => {
                    warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
