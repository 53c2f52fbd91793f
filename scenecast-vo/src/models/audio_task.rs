//! Voiceover task state machine
//!
//! A task progresses through the verification workflow:
//! PENDING → NORMALIZING → SYNTHESIZING → TRANSCRIBING → SCORING →
//! {ACCEPTED | RETRYING → SYNTHESIZING | FAILED} → SAVED
//!
//! Each loop iteration produces one immutable [`SynthesisAttempt`] appended
//! to the task's history, so the loop's current position is always
//! derivable from the attempt list length and the last attempt's outcome.

use chrono::{DateTime, Utc};
use scenecast_common::api::types::{
    ErrorKind, PublicStatus, SubmitTaskRequest, TaskResultView, TaskState, TaskStatusResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::normalize::NormalizationMapping;

/// One complete synthesize → transcribe → score cycle
///
/// Immutable once recorded. Attempts that die inside a provider call carry
/// the error classification and no transcription or similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisAttempt {
    /// 1-based position in the task's attempt history
    pub attempt_number: u32,
    /// Voice used (identical across attempts; verification proves
    /// reproducible fidelity, it does not hill-climb parameters)
    pub voice_id: String,
    /// Reference to the synthesized audio artifact, if synthesis succeeded
    pub audio_ref: Option<String>,
    /// Text recovered by transcribing the synthesized audio
    pub transcribed_text: Option<String>,
    /// Similarity of transcription against the normalized script
    pub similarity: Option<f64>,
    /// Whether this attempt met the accuracy threshold
    pub accepted: bool,
    /// Failure classification when the attempt did not complete scoring
    pub error: Option<ErrorKind>,
}

/// State transition record (for logging and event emission)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub task_id: Uuid,
    pub old_state: TaskState,
    pub new_state: TaskState,
    pub transitioned_at: DateTime<Utc>,
}

/// Voiceover verification task (aggregate root)
///
/// Exclusively owned and mutated by the worker executing its verification
/// loop; status queries and the progress transport read cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTask {
    pub task_id: Uuid,
    /// Script as submitted
    pub original_text: String,
    /// Script after spoken-form normalization (set once, cached for the
    /// life of the task, not re-run per attempt)
    pub normalized_text: Option<String>,
    /// Audit trail of every normalization replacement
    pub mappings: Vec<NormalizationMapping>,
    pub voice_id: String,
    pub language: String,
    pub accuracy_threshold: f64,
    pub max_attempts: u32,
    pub state: TaskState,
    pub attempts: Vec<SynthesisAttempt>,
    /// Accepted audio artifact, present only after a successful verdict
    pub final_audio_ref: Option<String>,
    /// Terminal failure classification
    pub error_kind: Option<ErrorKind>,
    /// Terminal failure diagnostics
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudioTask {
    /// Create a new task in PENDING from a submission request
    pub fn new(request: SubmitTaskRequest) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            original_text: request.text,
            normalized_text: None,
            mappings: Vec::new(),
            voice_id: request.voice_id,
            language: request.language,
            accuracy_threshold: request.accuracy_threshold,
            max_attempts: request.max_attempts,
            state: TaskState::Pending,
            attempts: Vec::new(),
            final_audio_ref: None,
            error_kind: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new state, stamping `updated_at`
    pub fn transition_to(&mut self, new_state: TaskState) -> StateTransition {
        let transition = StateTransition {
            task_id: self.task_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        self.updated_at = transition.transitioned_at;
        transition
    }

    /// Record the normalization result (runs once per task)
    pub fn set_normalization(&mut self, normalized_text: String, mappings: Vec<NormalizationMapping>) {
        self.normalized_text = Some(normalized_text);
        self.mappings = mappings;
        self.updated_at = Utc::now();
    }

    /// Append one finished attempt to the history
    pub fn push_attempt(&mut self, attempt: SynthesisAttempt) {
        debug_assert!(self.attempts.len() < self.max_attempts as usize);
        self.attempts.push(attempt);
        self.updated_at = Utc::now();
    }

    /// Record the terminal failure cause
    pub fn set_failure(&mut self, kind: ErrorKind, message: String) {
        self.error_kind = Some(kind);
        self.error = Some(message);
        self.updated_at = Utc::now();
    }

    /// 1-based number of the attempt currently (or next) in flight
    pub fn next_attempt_number(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    /// True once the task will make no further progress
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Highest-similarity attempt, for failure diagnostics
    pub fn best_attempt(&self) -> Option<&SynthesisAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.similarity.is_some())
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// The attempt that decided the task: the accepted one, or the best
    /// scoring one when every attempt fell short
    pub fn deciding_attempt(&self) -> Option<&SynthesisAttempt> {
        self.attempts
            .iter()
            .find(|a| a.accepted)
            .or_else(|| self.best_attempt())
            .or_else(|| self.attempts.last())
    }

    /// Coarse status projection reported to clients
    pub fn public_status(&self) -> PublicStatus {
        match self.state {
            TaskState::Pending => PublicStatus::Pending,
            TaskState::Normalizing
            | TaskState::Synthesizing
            | TaskState::Transcribing
            | TaskState::Scoring
            | TaskState::Retrying => PublicStatus::Running,
            TaskState::Accepted => PublicStatus::Success,
            TaskState::Failed | TaskState::Cancelled => PublicStatus::Failure,
            TaskState::Saved => {
                if self.final_audio_ref.is_some() {
                    PublicStatus::Success
                } else {
                    PublicStatus::Failure
                }
            }
        }
    }

    /// Result payload once a deciding attempt exists
    pub fn result_view(&self) -> Option<TaskResultView> {
        let deciding = self.deciding_attempt()?;
        let normalized_text = self.normalized_text.clone()?;

        let normalization_mappings: BTreeMap<String, String> = self
            .mappings
            .iter()
            .map(|m| (m.original.clone(), m.replacement.clone()))
            .collect();

        Some(TaskResultView {
            audio_ref: self.final_audio_ref.clone(),
            attempts: self.attempts.len() as u32,
            final_similarity: deciding.similarity.unwrap_or(0.0),
            transcribed_text: deciding.transcribed_text.clone().unwrap_or_default(),
            original_text: self.original_text.clone(),
            normalized_text,
            normalization_mappings,
        })
    }

    /// Snapshot for the status endpoint and the `connected` event
    pub fn status_response(&self) -> TaskStatusResponse {
        TaskStatusResponse {
            task_id: self.task_id,
            status: self.public_status(),
            state: self.state,
            result: self.result_view(),
            error: self.error.clone(),
        }
    }

    /// Per-attempt diagnostic lines for terminal failure reporting
    pub fn attempt_diagnostics(&self) -> String {
        let mut lines = Vec::with_capacity(self.attempts.len());
        for attempt in &self.attempts {
            let line = match (attempt.similarity, attempt.error) {
                (Some(similarity), _) => format!(
                    "attempt {}: similarity {:.3} below threshold {:.3}",
                    attempt.attempt_number, similarity, self.accuracy_threshold
                ),
                (None, Some(kind)) => format!(
                    "attempt {}: provider failure ({:?})",
                    attempt.attempt_number, kind
                ),
                (None, None) => format!("attempt {}: incomplete", attempt.attempt_number),
            };
            lines.push(line);
        }
        if let Some(best) = self.best_attempt() {
            lines.push(format!(
                "best attempt: {} (similarity {:.3})",
                best.attempt_number,
                best.similarity.unwrap_or(0.0)
            ));
        }
        lines.join("; ")
    }
}
