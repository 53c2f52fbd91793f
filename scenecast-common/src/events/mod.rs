//! Progress event types for the voiceover pipeline
//!
//! Provides the shared event definitions and `EventBus` used to fan task
//! state transitions out to streaming subscribers.

use crate::api::types::{ErrorKind, TaskState, TaskStatusResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Progress event for a voiceover task
///
/// Events are broadcast via [`EventBus`] and serialized one JSON object per
/// streaming message. The closed set of variants keeps the push path and
/// the polling path provably consistent: everything a subscriber can learn
/// from an event is also derivable from a status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// First message on every subscription: the task's current snapshot,
    /// so a late subscriber is not blind to already-completed progress.
    Connected {
        task_id: Uuid,
        snapshot: TaskStatusResponse,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A workflow state transition or per-attempt progress update
    Progress {
        task_id: Uuid,
        state: TaskState,
        #[serde(skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        similarity: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An attempt-level or task-level failure
    Error {
        task_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        kind: ErrorKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Terminal message: the task reached SAVED and this is its outcome
    Completed {
        task_id: Uuid,
        result: TaskStatusResponse,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Keepalive so clients can tell "alive but idle" from "silently dead"
    Pong {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ProgressEvent {
    /// Wire-level event type tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Connected { .. } => "connected",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Pong { .. } => "pong",
        }
    }

    /// Task this event belongs to, if any (`pong` is connection-scoped)
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            ProgressEvent::Connected { task_id, .. }
            | ProgressEvent::Progress { task_id, .. }
            | ProgressEvent::Error { task_id, .. }
            | ProgressEvent::Completed { task_id, .. } => Some(*task_id),
            ProgressEvent::Pong { .. } => None,
        }
    }

    /// True for the terminal `completed` message
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. })
    }
}

/// Event bus wrapping a tokio broadcast channel
///
/// The verification loop emits into the bus without knowing who listens;
/// streaming handlers subscribe and filter by task id. A slow or
/// disconnecting subscriber never blocks the emitter.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProgressEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Older events are dropped for lagging subscribers once the buffer
    /// fills; snapshots via the status endpoint remain authoritative.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received; the streaming
    /// handler compensates by sending a `connected` snapshot first.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of receivers, or an error when nobody listens.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ProgressEvent,
    ) -> Result<usize, broadcast::error::SendError<ProgressEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Progress delivery is best-effort fire-and-forget; a missed push must
    /// never block or fail the verification loop.
    pub fn emit_lossy(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No subscribers for progress event: {}", e.0.event_type());
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::PublicStatus;

    fn pending_snapshot(task_id: Uuid) -> TaskStatusResponse {
        TaskStatusResponse {
            task_id,
            status: PublicStatus::Pending,
            state: TaskState::Pending,
            result: None,
            error: None,
        }
    }

    #[test]
    fn event_type_matches_wire_tag() {
        let task_id = Uuid::new_v4();
        let event = ProgressEvent::Progress {
            task_id,
            state: TaskState::Synthesizing,
            attempt: Some(1),
            similarity: None,
            message: None,
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(event.event_type(), "progress");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"state\":\"SYNTHESIZING\""));
        // Absent optionals are omitted entirely, not serialized as null
        assert!(!json.contains("similarity"));
    }

    #[test]
    fn connected_event_round_trips() {
        let task_id = Uuid::new_v4();
        let event = ProgressEvent::Connected {
            task_id,
            snapshot: pending_snapshot(task_id),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        match back {
            ProgressEvent::Connected { snapshot, .. } => {
                assert_eq!(snapshot.task_id, task_id);
                assert_eq!(snapshot.status, PublicStatus::Pending);
            }
            other => panic!("wrong variant deserialized: {:?}", other),
        }
    }

    #[test]
    fn pong_has_no_task_id() {
        let event = ProgressEvent::Pong {
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.task_id(), None);
        assert_eq!(event.event_type(), "pong");
    }

    #[test]
    fn eventbus_delivers_to_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        let task_id = Uuid::new_v4();
        bus.emit(ProgressEvent::Connected {
            task_id,
            snapshot: pending_snapshot(task_id),
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().task_id(), Some(task_id));
        assert_eq!(rx2.try_recv().unwrap().task_id(), Some(task_id));
    }

    #[test]
    fn eventbus_emit_lossy_survives_no_subscribers() {
        let bus = EventBus::new(2);

        // Nobody listening: must not panic or error
        for _ in 0..5 {
            bus.emit_lossy(ProgressEvent::Pong {
                timestamp: chrono::Utc::now(),
            });
        }

        assert_eq!(bus.capacity(), 2);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
