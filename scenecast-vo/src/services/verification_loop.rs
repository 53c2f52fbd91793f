//! Verification loop controller
//!
//! Orchestrates one task through the verification workflow:
//!
//! PENDING → NORMALIZING → SYNTHESIZING → TRANSCRIBING → SCORING →
//! {ACCEPTED | RETRYING → SYNTHESIZING | FAILED} → SAVED
//!
//! The loop proves that the exact normalized script round-trips through
//! synthesis and transcription within the accuracy threshold. Attempts are
//! strictly sequential with identical parameters: a verified artifact must
//! be reproducible, so the loop never mutates voice or style between
//! attempts to chase a passing score.
//!
//! Failure semantics: transient provider errors are retried inside a
//! transport budget before consuming a verification attempt; permanent
//! provider errors short-circuit the task, since retrying cannot help.
//! Every terminal failure carries the full attempt history.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scenecast_common::api::types::{ErrorKind, TaskState};
use scenecast_common::events::{EventBus, ProgressEvent};

use crate::models::SynthesisAttempt;
use crate::normalize;
use crate::providers::{
    with_transport_retry, SynthesisProvider, TranscriptionProvider,
};
use crate::registry::TaskRegistry;
use crate::scoring;

/// How the attempt loop ended
#[derive(Debug, Clone)]
enum LoopOutcome {
    /// An attempt met the threshold
    Accepted { audio_ref: String },
    /// Every attempt completed below the threshold
    ThresholdNotMet,
    /// A provider error terminated the loop (permanent, or transient with
    /// no attempt budget left)
    ProviderFailure { kind: ErrorKind, message: String },
    /// Cooperative cancellation observed at a checkpoint
    Cancelled,
}

/// Verification loop controller
///
/// One instance may execute many tasks, but each running task is owned by
/// exactly one `execute` call for its entire lifetime.
pub struct VerificationLoop {
    db: SqlitePool,
    event_bus: EventBus,
    registry: TaskRegistry,
    synthesis: Arc<dyn SynthesisProvider>,
    transcription: Arc<dyn TranscriptionProvider>,
    media_dir: PathBuf,
    transport_retry_attempts: u32,
}

impl VerificationLoop {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        registry: TaskRegistry,
        synthesis: Arc<dyn SynthesisProvider>,
        transcription: Arc<dyn TranscriptionProvider>,
        media_dir: PathBuf,
        transport_retry_attempts: u32,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry,
            synthesis,
            transcription,
            media_dir,
            transport_retry_attempts,
        }
    }

    /// Execute the complete verification workflow for one task
    pub async fn execute(&self, task_id: Uuid, cancel_token: CancellationToken) -> Result<()> {
        let Some(task) = self.registry.snapshot(task_id).await else {
            anyhow::bail!("Task not found in registry: {}", task_id);
        };
        let started = std::time::Instant::now();

        tracing::info!(
            task_id = %task_id,
            voice_id = %task.voice_id,
            language = %task.language,
            accuracy_threshold = task.accuracy_threshold,
            max_attempts = task.max_attempts,
            "Starting verification loop"
        );

        if cancel_token.is_cancelled() {
            return self.finish_cancelled(task_id).await;
        }

        // Normalization runs once; the result is cached on the task and
        // reused verbatim by every attempt.
        self.advance(
            task_id,
            TaskState::Normalizing,
            None,
            Some("Normalizing script to spoken form"),
        )
        .await?;

        let normalized = normalize::normalize(&task.original_text, &task.language);
        let normalized_text = normalized.text.clone();
        self.registry
            .update(task_id, move |t| {
                t.set_normalization(normalized.text, normalized.mappings)
            })
            .await;
        self.persist(task_id).await?;

        tracing::debug!(
            task_id = %task_id,
            normalized_chars = normalized_text.chars().count(),
            "Script normalized"
        );

        let max_attempts = task.max_attempts;
        let threshold = task.accuracy_threshold;
        let voice_id = task.voice_id.clone();
        let language = task.language.clone();

        let outcome = loop {
            let attempt_number = match self.registry.snapshot(task_id).await {
                Some(t) => t.next_attempt_number(),
                None => anyhow::bail!("Task evicted mid-run: {}", task_id),
            };

            if cancel_token.is_cancelled() {
                break LoopOutcome::Cancelled;
            }

            self.advance(
                task_id,
                TaskState::Synthesizing,
                Some(attempt_number),
                Some("Requesting speech synthesis"),
            )
            .await?;

            let audio = match with_transport_retry(
                "synthesize",
                self.transport_retry_attempts,
                || self.synthesis.synthesize(&normalized_text, &voice_id, &language),
            )
            .await
            {
                Ok(audio) => audio,
                Err(err) => {
                    let kind = err.kind();
                    tracing::warn!(
                        task_id = %task_id,
                        attempt = attempt_number,
                        error = %err,
                        "Synthesis failed for attempt"
                    );
                    self.record_failed_attempt(task_id, attempt_number, &voice_id, None, kind)
                        .await;
                    self.emit_error(task_id, Some(attempt_number), kind, err.to_string());
                    self.persist(task_id).await?;

                    if !err.is_transient() {
                        break LoopOutcome::ProviderFailure {
                            kind,
                            message: err.to_string(),
                        };
                    }
                    if attempt_number >= max_attempts {
                        break LoopOutcome::ProviderFailure {
                            kind,
                            message: err.to_string(),
                        };
                    }
                    self.advance(
                        task_id,
                        TaskState::Retrying,
                        Some(attempt_number + 1),
                        Some("Transient synthesis failure, starting next attempt"),
                    )
                    .await?;
                    continue;
                }
            };

            let audio_ref = self.store_audio(task_id, attempt_number, &audio).await?;

            if cancel_token.is_cancelled() {
                break LoopOutcome::Cancelled;
            }

            self.advance(
                task_id,
                TaskState::Transcribing,
                Some(attempt_number),
                Some("Transcribing synthesized audio"),
            )
            .await?;

            let transcribed = match with_transport_retry(
                "transcribe",
                self.transport_retry_attempts,
                || self.transcription.transcribe(&audio, &language),
            )
            .await
            {
                Ok(text) => text,
                Err(err) => {
                    let kind = err.kind();
                    tracing::warn!(
                        task_id = %task_id,
                        attempt = attempt_number,
                        error = %err,
                        "Transcription failed for attempt"
                    );
                    self.record_failed_attempt(
                        task_id,
                        attempt_number,
                        &voice_id,
                        Some(audio_ref.clone()),
                        kind,
                    )
                    .await;
                    self.emit_error(task_id, Some(attempt_number), kind, err.to_string());
                    self.persist(task_id).await?;

                    if !err.is_transient() || attempt_number >= max_attempts {
                        break LoopOutcome::ProviderFailure {
                            kind,
                            message: err.to_string(),
                        };
                    }
                    self.advance(
                        task_id,
                        TaskState::Retrying,
                        Some(attempt_number + 1),
                        Some("Transient transcription failure, starting next attempt"),
                    )
                    .await?;
                    continue;
                }
            };

            self.advance(
                task_id,
                TaskState::Scoring,
                Some(attempt_number),
                Some("Scoring round-trip similarity"),
            )
            .await?;

            let similarity = scoring::score(&normalized_text, &transcribed);
            let accepted = similarity >= threshold;

            {
                let voice_id = voice_id.clone();
                let audio_ref = audio_ref.clone();
                let transcribed = transcribed.clone();
                self.registry
                    .update(task_id, move |t| {
                        t.push_attempt(SynthesisAttempt {
                            attempt_number,
                            voice_id,
                            audio_ref: Some(audio_ref),
                            transcribed_text: Some(transcribed),
                            similarity: Some(similarity),
                            accepted,
                            error: None,
                        })
                    })
                    .await;
            }
            self.persist(task_id).await?;

            self.event_bus.emit_lossy(ProgressEvent::Progress {
                task_id,
                state: TaskState::Scoring,
                attempt: Some(attempt_number),
                similarity: Some(similarity),
                message: None,
                timestamp: Utc::now(),
            });

            tracing::info!(
                task_id = %task_id,
                attempt = attempt_number,
                similarity,
                accepted,
                "Attempt scored"
            );

            if accepted {
                break LoopOutcome::Accepted { audio_ref };
            }
            if attempt_number >= max_attempts {
                break LoopOutcome::ThresholdNotMet;
            }
            self.advance(
                task_id,
                TaskState::Retrying,
                Some(attempt_number + 1),
                Some("Similarity below threshold, starting next attempt"),
            )
            .await?;
        };

        match outcome {
            LoopOutcome::Cancelled => return self.finish_cancelled(task_id).await,
            LoopOutcome::Accepted { audio_ref } => {
                self.registry
                    .update(task_id, move |t| {
                        t.final_audio_ref = Some(audio_ref);
                        t.transition_to(TaskState::Accepted);
                    })
                    .await;
                self.event_bus.emit_lossy(ProgressEvent::Progress {
                    task_id,
                    state: TaskState::Accepted,
                    attempt: None,
                    similarity: None,
                    message: Some("Verification accepted".to_string()),
                    timestamp: Utc::now(),
                });
            }
            LoopOutcome::ThresholdNotMet => {
                let diagnostics = self
                    .registry
                    .update(task_id, |t| {
                        let diagnostics = t.attempt_diagnostics();
                        t.set_failure(
                            ErrorKind::ThresholdNotMet,
                            format!(
                                "No attempt reached threshold {:.2}: {}",
                                t.accuracy_threshold, diagnostics
                            ),
                        );
                        t.transition_to(TaskState::Failed);
                        diagnostics
                    })
                    .await
                    .unwrap_or_default();
                self.emit_error(
                    task_id,
                    None,
                    ErrorKind::ThresholdNotMet,
                    format!("All attempts fell short: {}", diagnostics),
                );
            }
            LoopOutcome::ProviderFailure { kind, message } => {
                self.registry
                    .update(task_id, |t| {
                        let diagnostics = t.attempt_diagnostics();
                        t.set_failure(kind, format!("{} ({})", message, diagnostics));
                        t.transition_to(TaskState::Failed);
                    })
                    .await;
                self.emit_error(task_id, None, kind, message);
            }
        }
        self.persist(task_id).await?;

        // SAVED: the outcome (accepted audio reference, or the attempt
        // history with diagnostics) is durably recorded before the final
        // event goes out.
        self.registry
            .update(task_id, |t| t.transition_to(TaskState::Saved))
            .await;
        self.persist(task_id).await?;

        let final_status = self
            .registry
            .status(task_id)
            .await
            .ok_or_else(|| anyhow::anyhow!("Task evicted before completion: {}", task_id))?;

        self.event_bus.emit_lossy(ProgressEvent::Completed {
            task_id,
            result: final_status.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            task_id = %task_id,
            status = ?final_status.status,
            duration_ms = started.elapsed().as_millis() as u64,
            "Verification loop completed"
        );

        Ok(())
    }

    /// Transition the task, persist the snapshot, and emit a progress event
    async fn advance(
        &self,
        task_id: Uuid,
        state: TaskState,
        attempt: Option<u32>,
        message: Option<&str>,
    ) -> Result<()> {
        self.registry
            .update(task_id, |t| t.transition_to(state))
            .await;
        self.persist(task_id).await?;
        self.event_bus.emit_lossy(ProgressEvent::Progress {
            task_id,
            state,
            attempt,
            similarity: None,
            message: message.map(|m| m.to_string()),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Mirror the current in-memory snapshot into the database
    async fn persist(&self, task_id: Uuid) -> Result<()> {
        if let Some(task) = self.registry.snapshot(task_id).await {
            crate::db::tasks::save_task(&self.db, &task).await?;
        }
        Ok(())
    }

    /// Append an attempt that died inside a provider call
    async fn record_failed_attempt(
        &self,
        task_id: Uuid,
        attempt_number: u32,
        voice_id: &str,
        audio_ref: Option<String>,
        kind: ErrorKind,
    ) {
        let voice_id = voice_id.to_string();
        self.registry
            .update(task_id, move |t| {
                t.push_attempt(SynthesisAttempt {
                    attempt_number,
                    voice_id,
                    audio_ref,
                    transcribed_text: None,
                    similarity: None,
                    accepted: false,
                    error: Some(kind),
                })
            })
            .await;
    }

    fn emit_error(&self, task_id: Uuid, attempt: Option<u32>, kind: ErrorKind, message: String) {
        self.event_bus.emit_lossy(ProgressEvent::Error {
            task_id,
            attempt,
            kind,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Write the synthesized audio under the media directory
    ///
    /// Returns the artifact reference (path relative to the media root).
    async fn store_audio(
        &self,
        task_id: Uuid,
        attempt_number: u32,
        audio: &[u8],
    ) -> Result<String> {
        let dir = self.media_dir.join(task_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("attempt-{}.wav", attempt_number);
        tokio::fs::write(dir.join(&file_name), audio).await?;
        Ok(format!("{}/{}", task_id, file_name))
    }

    /// Terminal path for cooperative cancellation
    async fn finish_cancelled(&self, task_id: Uuid) -> Result<()> {
        tracing::info!(task_id = %task_id, "Task cancelled by client");

        self.registry
            .update(task_id, |t| {
                t.set_failure(ErrorKind::Cancelled, "Cancelled by client".to_string());
                t.transition_to(TaskState::Cancelled);
            })
            .await;
        self.persist(task_id).await?;

        self.emit_error(
            task_id,
            None,
            ErrorKind::Cancelled,
            "Cancelled by client".to_string(),
        );
        if let Some(status) = self.registry.status(task_id).await {
            self.event_bus.emit_lossy(ProgressEvent::Completed {
                task_id,
                result: status,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }
}
