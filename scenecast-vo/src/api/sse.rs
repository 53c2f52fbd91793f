//! Server-Sent Events for task progress streaming
//!
//! One stream per task: the `connected` snapshot first, a `pong`
//! keepalive on a fixed interval, and every progress event the
//! verification loop emits for that task, ending with `completed`.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use chrono::Utc;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scenecast_common::events::ProgressEvent;
use scenecast_common::sse::HEARTBEAT_INTERVAL_SECS;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /events - service-level heartbeat stream
pub async fn event_stream(
    State(_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    scenecast_common::sse::create_heartbeat_sse_stream("scenecast-vo")
}

/// Serialize a progress event into an SSE message
fn sse_message(event: &ProgressEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            None
        }
    }
}

/// GET /voiceover/events/{task_id} - SSE progress stream for one task
///
/// The first message is always a `connected` event carrying the task's
/// current snapshot, so a subscriber attaching after completion is not
/// blind to already-finished work. For an already-terminal task the
/// stream closes right after the snapshot; re-subscribing never
/// duplicates work or re-reports completion.
pub async fn task_event_stream(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Resolve the snapshot before subscribing so an unknown id is a 404,
    // not an empty stream.
    let snapshot = match state.registry.status(task_id).await {
        Some(status) => status,
        None => crate::db::tasks::load_task(&state.db, task_id)
            .await?
            .map(|t| t.status_response())
            .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?,
    };

    // Subscribe before snapshotting again would be racy the other way
    // around: events emitted between snapshot and subscribe are covered by
    // the snapshot itself.
    let mut rx = state.event_bus.subscribe();

    info!(task_id = %task_id, "New SSE subscriber for task events");

    let stream = async_stream::stream! {
        let terminal_at_connect = snapshot.is_terminal();
        let connected = ProgressEvent::Connected {
            task_id,
            snapshot,
            timestamp: Utc::now(),
        };
        if let Some(message) = sse_message(&connected) {
            yield Ok(message);
        }

        // For an already-terminal task the snapshot says everything;
        // close instead of replaying a completed event.
        while !terminal_at_connect {
            tokio::select! {
                // Keepalive lets the client tell "alive but idle" from
                // "silently dead"
                _ = tokio::time::sleep(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)) => {
                    debug!(task_id = %task_id, "SSE: Sending pong");
                    let pong = ProgressEvent::Pong { timestamp: Utc::now() };
                    if let Some(message) = sse_message(&pong) {
                        yield Ok(message);
                    }
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if event.task_id() != Some(task_id) {
                                continue;
                            }
                            let terminal = event.is_terminal();
                            if let Some(message) = sse_message(&event) {
                                yield Ok(message);
                            }
                            if terminal {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Dropped events are recoverable: the status
                            // endpoint stays authoritative
                            warn!(task_id = %task_id, skipped, "SSE subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }
            }
        }

        debug!(task_id = %task_id, "SSE task stream closed");
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS))
            .text("heartbeat"),
    ))
}
