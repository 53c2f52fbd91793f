//! Voiceover task API handlers
//!
//! POST /voiceover/tasks, GET /voiceover/tasks/{task_id},
//! POST /voiceover/tasks/{task_id}/cancel, GET /voiceover/tasks/{task_id}/audio

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scenecast_common::api::types::{
    ErrorKind, PublicStatus, SubmitTaskRequest, SubmitTaskResponse, TaskState, TaskStatusResponse,
};

use crate::{
    error::{ApiError, ApiResult},
    models::AudioTask,
    services::VerificationLoop,
    AppState,
};

/// Upper bound on the attempt budget a client may request
const MAX_ATTEMPT_BUDGET: u32 = 20;

/// POST /voiceover/tasks/{task_id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelTaskResponse {
    pub task_id: Uuid,
    pub state: TaskState,
    pub message: String,
}

/// POST /voiceover/tasks
///
/// Submit a script for verified synthesis. Returns immediately: the task
/// is durably recorded in PENDING and a worker is scheduled; no synthesis
/// happens before the response.
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitTaskRequest>,
) -> ApiResult<Json<SubmitTaskResponse>> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    if request.voice_id.trim().is_empty() {
        return Err(ApiError::BadRequest("voice_id must not be empty".to_string()));
    }
    if request.language.trim().is_empty() {
        return Err(ApiError::BadRequest("language must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&request.accuracy_threshold) {
        return Err(ApiError::BadRequest(format!(
            "accuracy_threshold out of range: {}",
            request.accuracy_threshold
        )));
    }
    if request.max_attempts == 0 || request.max_attempts > MAX_ATTEMPT_BUDGET {
        return Err(ApiError::BadRequest(format!(
            "max_attempts must be between 1 and {}",
            MAX_ATTEMPT_BUDGET
        )));
    }

    let task = AudioTask::new(request);
    let task_id = task.task_id;

    // Record the submission before acknowledging it: in-memory for live
    // reads, database for durability.
    state.registry.insert(task.clone()).await;
    crate::db::tasks::save_task(&state.db, &task).await?;

    let cancel_token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(task_id, cancel_token.clone());

    tracing::info!(
        task_id = %task_id,
        voice_id = %task.voice_id,
        language = %task.language,
        "Voiceover task submitted and persisted"
    );

    spawn_verification(state, task_id, cancel_token);

    Ok(Json(SubmitTaskResponse {
        status: "processing".to_string(),
        task_id,
        message: "Task accepted; follow progress via the event stream or status polling"
            .to_string(),
    }))
}

/// GET /voiceover/tasks/{task_id}
///
/// Snapshot of whatever state the task is currently in. Never blocks on
/// in-flight work.
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let status = lookup_status(&state, task_id).await?;
    tracing::debug!(task_id = %task_id, status = ?status.status, "Status query");
    Ok(Json(status))
}

/// POST /voiceover/tasks/{task_id}/cancel
///
/// Cooperative cancellation: trips the task's cancellation flag, which the
/// verification loop checks between attempts and between provider calls.
/// An in-flight provider call is never aborted.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<CancelTaskResponse>> {
    let snapshot = state
        .registry
        .snapshot(task_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?;

    if snapshot.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Task already in terminal state: {:?}",
            snapshot.state
        )));
    }

    let tokens = state.cancellation_tokens.read().await;
    match tokens.get(&task_id) {
        Some(token) => token.cancel(),
        None => {
            return Err(ApiError::Internal(format!(
                "No cancellation token registered for task {}",
                task_id
            )))
        }
    }

    tracing::info!(task_id = %task_id, "Cancellation requested");

    Ok(Json(CancelTaskResponse {
        task_id,
        state: snapshot.state,
        message: "Cancellation requested; the task stops at the next checkpoint".to_string(),
    }))
}

/// GET /voiceover/tasks/{task_id}/audio
///
/// Download the accepted audio artifact. Only valid once the task has
/// succeeded.
pub async fn download_audio(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let status = lookup_status(&state, task_id).await?;

    if status.status != PublicStatus::Success {
        return Err(ApiError::Conflict(format!(
            "Audio is only available for successful tasks (current status: {:?})",
            status.status
        )));
    }

    let audio_ref = status
        .result
        .as_ref()
        .and_then(|r| r.audio_ref.clone())
        .ok_or_else(|| {
            ApiError::Internal(format!("Successful task {} has no audio reference", task_id))
        })?;

    let path = state.media_dir.join(&audio_ref);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!(task_id = %task_id, path = %path.display(), error = %e, "Audio artifact missing");
        ApiError::Internal(format!("Audio artifact unreadable: {}", e))
    })?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes))
}

/// Registry first (live tasks), database second (completed tasks after a
/// restart evicted them from memory).
async fn lookup_status(state: &AppState, task_id: Uuid) -> ApiResult<TaskStatusResponse> {
    if let Some(status) = state.registry.status(task_id).await {
        return Ok(status);
    }
    let task = crate::db::tasks::load_task(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?;
    Ok(task.status_response())
}

/// Schedule the verification loop for a submitted task
///
/// The spawned task first acquires a worker slot, so at most
/// `worker_slots` verification loops run concurrently; everything else
/// waits in PENDING. Exactly one spawn per task: the worker owns the task
/// record for its entire lifetime.
pub fn spawn_verification(state: AppState, task_id: Uuid, cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let _permit = match state.worker_slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!(task_id = %task_id, "Worker pool closed; task will not run");
                return;
            }
        };

        let controller = VerificationLoop::new(
            state.db.clone(),
            state.event_bus.clone(),
            state.registry.clone(),
            state.synthesis.clone(),
            state.transcription.clone(),
            state.media_dir.clone(),
            state.transport_retry_attempts,
        );

        if let Err(e) = controller.execute(task_id, cancel_token).await {
            tracing::error!(
                task_id = %task_id,
                error = %e,
                "Verification loop failed"
            );
            *state.last_error.write().await = Some(e.to_string());

            // The task must never be left in a non-terminal state: mark it
            // failed in memory and best-effort in the database.
            state
                .registry
                .update(task_id, |t| {
                    if !t.is_terminal() {
                        t.set_failure(ErrorKind::Internal, format!("Verification loop failed: {}", e));
                        t.transition_to(TaskState::Failed);
                        t.transition_to(TaskState::Saved);
                    }
                })
                .await;
            if let Some(task) = state.registry.snapshot(task_id).await {
                if let Err(db_err) = crate::db::tasks::save_task(&state.db, &task).await {
                    tracing::error!(
                        task_id = %task_id,
                        error = %db_err,
                        "Failed to persist failure state"
                    );
                }
            }
        }

        state.cancellation_tokens.write().await.remove(&task_id);
    });
}

/// Build voiceover task routes
pub fn voiceover_routes() -> Router<AppState> {
    Router::new()
        .route("/voiceover/tasks", post(submit_task))
        .route("/voiceover/tasks/:task_id", get(get_task_status))
        .route("/voiceover/tasks/:task_id/cancel", post(cancel_task))
        .route("/voiceover/tasks/:task_id/audio", get(download_audio))
}
