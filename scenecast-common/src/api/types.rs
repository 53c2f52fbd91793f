//! Shared API request/response types
//!
//! Types used by the voiceover service and every client that submits
//! scripts, polls status, or follows the progress stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default similarity threshold an attempt must reach to be accepted
pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 0.95;

/// Default number of synthesis attempts before a task is failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

fn default_accuracy_threshold() -> f64 {
    DEFAULT_ACCURACY_THRESHOLD
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Voiceover task workflow state
///
/// A task progresses PENDING → NORMALIZING → SYNTHESIZING → TRANSCRIBING →
/// SCORING, loops back through RETRYING while the attempt budget lasts, and
/// settles in ACCEPTED or FAILED before the outcome is persisted (SAVED).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    /// Submitted, waiting for a worker slot
    Pending,
    /// Spoken-form normalization of the script
    Normalizing,
    /// Synthesis provider call for the current attempt
    Synthesizing,
    /// Transcription provider call against the fresh audio
    Transcribing,
    /// Similarity scoring of the round-tripped text
    Scoring,
    /// Attempt rejected, looping back for the next one
    Retrying,
    /// An attempt met the accuracy threshold
    Accepted,
    /// Attempt budget exhausted or provider rejected the task outright
    Failed,
    /// Cancelled cooperatively before reaching a verdict
    Cancelled,
    /// Final outcome persisted; nothing further will happen
    Saved,
}

impl TaskState {
    /// True once no further state transitions will occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Saved | TaskState::Cancelled)
    }
}

/// Machine-readable failure classification attached to attempts and results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, rate limit, or 5xx from a provider; retried before counting
    ProviderTransient,
    /// Provider rejected the request outright; retrying cannot help
    ProviderPermanent,
    /// Every attempt completed but none reached the accuracy threshold
    ThresholdNotMet,
    /// Task cancelled by the client
    Cancelled,
    /// Orchestration failure inside the service itself
    Internal,
}

/// POST /voiceover/tasks request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    /// Script text to synthesize and verify
    pub text: String,
    /// Provider voice identifier
    pub voice_id: String,
    /// BCP-47 style language code (e.g. "ko", "en")
    pub language: String,
    /// Minimum similarity for an attempt to be accepted
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold: f64,
    /// Verification attempt budget
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// POST /voiceover/tasks response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    /// Always "processing"; submission never waits for synthesis
    pub status: String,
    /// Assigned task identifier
    pub task_id: Uuid,
    /// Human-readable acknowledgement
    pub message: String,
}

/// Coarse status projection reported to clients
///
/// The fine-grained [`TaskState`] machine collapses to four externally
/// visible phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PublicStatus {
    Pending,
    Running,
    Success,
    Failure,
}

/// Final result payload for a task that reached a verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultView {
    /// Reference to the accepted audio artifact (absent on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    /// Number of synthesis attempts consumed
    pub attempts: u32,
    /// Similarity of the deciding attempt (accepted, or best on failure)
    pub final_similarity: f64,
    /// Transcription recovered from the deciding attempt's audio
    pub transcribed_text: String,
    /// Script as submitted
    pub original_text: String,
    /// Script after spoken-form normalization
    pub normalized_text: String,
    /// Audit map of every normalization replacement (original → replacement)
    pub normalization_mappings: BTreeMap<String, String>,
}

/// GET /voiceover/tasks/{task_id} response body
///
/// Also embedded in `connected` progress events so that late subscribers
/// see already-completed work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub status: PublicStatus,
    /// Fine-grained workflow state for progress display
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatusResponse {
    /// True once the task will make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, PublicStatus::Success | PublicStatus::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_state_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&TaskState::Synthesizing).unwrap(),
            "\"SYNTHESIZING\""
        );
        assert_eq!(
            serde_json::to_string(&PublicStatus::Failure).unwrap(),
            "\"FAILURE\""
        );
    }

    #[test]
    fn submit_request_defaults_apply() {
        let request: SubmitTaskRequest = serde_json::from_str(
            r#"{"text": "안녕하세요", "voice_id": "nara", "language": "ko"}"#,
        )
        .unwrap();

        assert_eq!(request.accuracy_threshold, DEFAULT_ACCURACY_THRESHOLD);
        assert_eq!(request.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::ThresholdNotMet).unwrap(),
            "\"threshold_not_met\""
        );
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Saved.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Accepted.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
    }
}
