//! Subscriber reconnect state machine
//!
//! The client half of the progress protocol. A subscriber following a task
//! moves through an explicit phase machine:
//!
//! Connected → Reconnecting(n) → Polling → Terminal
//!
//! On disconnect it retries the subscription with doubling backoff up to a
//! bounded attempt count, then falls back to polling the status endpoint at
//! a fixed interval until the task reaches a terminal state. Keeping the
//! machine free of timers and I/O makes budget exhaustion and terminal
//! detection unit-testable without real network timing.

use crate::api::types::TaskStatusResponse;
use crate::events::ProgressEvent;
use std::time::Duration;

/// Reconnect and polling tuning for a progress subscriber
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// First reconnect delay; doubles on each subsequent attempt
    pub base_delay: Duration,
    /// Ceiling for the doubling backoff
    pub max_delay: Duration,
    /// Reconnect attempts before giving up on the stream
    pub max_reconnect_attempts: u32,
    /// Status polling cadence after the reconnect budget is exhausted
    pub poll_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay before the given 1-based reconnect attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        delay.min(self.max_delay)
    }
}

/// Where the subscriber currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberPhase {
    /// Stream is up and delivering events
    Connected,
    /// Stream lost; waiting to retry the subscription (1-based attempt)
    Reconnecting { attempt: u32 },
    /// Reconnect budget exhausted; polling the status endpoint
    Polling,
    /// Task reached a terminal state; nothing left to observe
    Terminal,
}

/// What the driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberAction {
    /// Re-attempt the streaming subscription after the given delay
    Resubscribe { delay: Duration },
    /// Poll the status endpoint at the given interval
    Poll { interval: Duration },
    /// Stop; the task is terminal
    Stop,
}

/// Reconnect-then-poll decision logic for one task subscription
#[derive(Debug, Clone)]
pub struct SubscriberStateMachine {
    policy: ReconnectPolicy,
    phase: SubscriberPhase,
}

impl SubscriberStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            // The initial subscription is attempt 1 of the reconnect budget
            phase: SubscriberPhase::Reconnecting { attempt: 0 },
        }
    }

    pub fn phase(&self) -> SubscriberPhase {
        self.phase
    }

    /// The stream came up. Resets the reconnect budget: re-subscribing to
    /// the same task is idempotent, so a recovered connection starts fresh.
    pub fn on_connected(&mut self) {
        if self.phase != SubscriberPhase::Terminal {
            self.phase = SubscriberPhase::Connected;
        }
    }

    /// Feed a received progress event; returns true once the task is done.
    ///
    /// Both the `completed` message and a `connected` snapshot that already
    /// shows a terminal status end the subscription, so a subscriber that
    /// attaches after the fact does not wait forever for events that were
    /// emitted before it arrived.
    pub fn on_event(&mut self, event: &ProgressEvent) -> bool {
        let terminal = match event {
            ProgressEvent::Completed { .. } => true,
            ProgressEvent::Connected { snapshot, .. } => snapshot.is_terminal(),
            _ => false,
        };
        if terminal {
            self.phase = SubscriberPhase::Terminal;
        }
        terminal
    }

    /// The stream dropped. Decides between another reconnect attempt and
    /// the polling fallback.
    pub fn on_disconnect(&mut self) -> SubscriberAction {
        match self.phase {
            SubscriberPhase::Terminal => SubscriberAction::Stop,
            SubscriberPhase::Polling => SubscriberAction::Poll {
                interval: self.policy.poll_interval,
            },
            SubscriberPhase::Connected | SubscriberPhase::Reconnecting { .. } => {
                let attempt = match self.phase {
                    SubscriberPhase::Reconnecting { attempt } => attempt + 1,
                    _ => 1,
                };
                if attempt > self.policy.max_reconnect_attempts {
                    self.phase = SubscriberPhase::Polling;
                    SubscriberAction::Poll {
                        interval: self.policy.poll_interval,
                    }
                } else {
                    self.phase = SubscriberPhase::Reconnecting { attempt };
                    SubscriberAction::Resubscribe {
                        delay: self.policy.backoff_delay(attempt),
                    }
                }
            }
        }
    }

    /// Feed a polled status snapshot; returns true once the task is done.
    pub fn on_status(&mut self, status: &TaskStatusResponse) -> bool {
        if status.is_terminal() {
            self.phase = SubscriberPhase::Terminal;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{PublicStatus, TaskState};
    use uuid::Uuid;

    fn status(task_id: Uuid, status: PublicStatus, state: TaskState) -> TaskStatusResponse {
        TaskStatusResponse {
            task_id,
            status,
            state,
            result: None,
            error: None,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(16));
        // Capped at max_delay from here on
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(30));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn reconnect_budget_then_polling() {
        let policy = ReconnectPolicy::default();
        let mut machine = SubscriberStateMachine::new(policy.clone());

        for attempt in 1..=policy.max_reconnect_attempts {
            match machine.on_disconnect() {
                SubscriberAction::Resubscribe { delay } => {
                    assert_eq!(delay, policy.backoff_delay(attempt));
                    assert_eq!(
                        machine.phase(),
                        SubscriberPhase::Reconnecting { attempt }
                    );
                }
                other => panic!("expected resubscribe, got {:?}", other),
            }
        }

        // Budget exhausted: sixth disconnect switches to polling
        assert_eq!(
            machine.on_disconnect(),
            SubscriberAction::Poll {
                interval: policy.poll_interval
            }
        );
        assert_eq!(machine.phase(), SubscriberPhase::Polling);
    }

    #[test]
    fn successful_reconnect_resets_budget() {
        let mut machine = SubscriberStateMachine::new(ReconnectPolicy::default());

        machine.on_disconnect();
        machine.on_disconnect();
        machine.on_disconnect();
        machine.on_connected();

        // After recovery the next disconnect is attempt 1 again
        match machine.on_disconnect() {
            SubscriberAction::Resubscribe { delay } => {
                assert_eq!(delay, Duration::from_secs(1));
            }
            other => panic!("expected resubscribe, got {:?}", other),
        }
    }

    #[test]
    fn completed_event_is_terminal() {
        let mut machine = SubscriberStateMachine::new(ReconnectPolicy::default());
        machine.on_connected();

        let task_id = Uuid::new_v4();
        let done = machine.on_event(&ProgressEvent::Completed {
            task_id,
            result: status(task_id, PublicStatus::Success, TaskState::Saved),
            timestamp: chrono::Utc::now(),
        });

        assert!(done);
        assert_eq!(machine.phase(), SubscriberPhase::Terminal);
        assert_eq!(machine.on_disconnect(), SubscriberAction::Stop);
    }

    #[test]
    fn late_subscriber_sees_terminal_snapshot() {
        let mut machine = SubscriberStateMachine::new(ReconnectPolicy::default());
        machine.on_connected();

        // The connected snapshot already reflects the finished task
        let task_id = Uuid::new_v4();
        let done = machine.on_event(&ProgressEvent::Connected {
            task_id,
            snapshot: status(task_id, PublicStatus::Success, TaskState::Saved),
            timestamp: chrono::Utc::now(),
        });

        assert!(done);
        assert_eq!(machine.phase(), SubscriberPhase::Terminal);
    }

    #[test]
    fn progress_events_are_not_terminal() {
        let mut machine = SubscriberStateMachine::new(ReconnectPolicy::default());
        machine.on_connected();

        let task_id = Uuid::new_v4();
        assert!(!machine.on_event(&ProgressEvent::Progress {
            task_id,
            state: TaskState::Scoring,
            attempt: Some(2),
            similarity: Some(0.88),
            message: None,
            timestamp: chrono::Utc::now(),
        }));
        assert!(!machine.on_event(&ProgressEvent::Pong {
            timestamp: chrono::Utc::now(),
        }));
        assert_eq!(machine.phase(), SubscriberPhase::Connected);
    }

    #[test]
    fn polling_stops_on_terminal_status() {
        let policy = ReconnectPolicy::default();
        let mut machine = SubscriberStateMachine::new(policy.clone());

        for _ in 0..=policy.max_reconnect_attempts {
            machine.on_disconnect();
        }
        assert_eq!(machine.phase(), SubscriberPhase::Polling);

        let task_id = Uuid::new_v4();
        assert!(!machine.on_status(&status(
            task_id,
            PublicStatus::Running,
            TaskState::Transcribing
        )));
        assert!(machine.on_status(&status(
            task_id,
            PublicStatus::Failure,
            TaskState::Saved
        )));
        assert_eq!(machine.phase(), SubscriberPhase::Terminal);
    }
}
