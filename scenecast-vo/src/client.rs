//! Progress subscription client
//!
//! Drives the reconnect-then-poll state machine over HTTP: subscribe to a
//! task's SSE stream, parse one JSON event per `data:` line, and on
//! disconnect follow the machine's decision: resubscribe with backoff,
//! or fall back to status polling until the task is terminal.
//!
//! Used by the console UI and by integration harnesses; the service never
//! subscribes to itself.

use futures::StreamExt;
use uuid::Uuid;

use scenecast_common::api::types::{SubmitTaskRequest, SubmitTaskResponse, TaskStatusResponse};
use scenecast_common::events::ProgressEvent;
use scenecast_common::subscriber::{ReconnectPolicy, SubscriberAction, SubscriberStateMachine};
use scenecast_common::{Error, Result};

/// HTTP client for the voiceover service
pub struct ProgressClient {
    http_client: reqwest::Client,
    base_url: String,
    policy: ReconnectPolicy,
}

impl ProgressClient {
    pub fn new(base_url: impl Into<String>, policy: ReconnectPolicy) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client construction failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    /// Submit a script for verified synthesis
    pub async fn submit(&self, request: &SubmitTaskRequest) -> Result<SubmitTaskResponse> {
        let url = format!("{}/voiceover/tasks", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "Submission rejected ({}): {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Malformed submission response: {}", e)))
    }

    /// Poll the task status endpoint once
    pub async fn get_status(&self, task_id: Uuid) -> Result<TaskStatusResponse> {
        let url = format!("{}/voiceover/tasks/{}", self.base_url, task_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(Error::NotFound(format!("Task not found: {}", task_id)));
        }
        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "Status query failed ({})",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Malformed status response: {}", e)))
    }

    /// Follow a task to completion, invoking `on_event` for every received
    /// progress event. Returns the final status.
    ///
    /// Survives stream disconnects per the reconnect policy; after the
    /// reconnect budget is exhausted, polls the status endpoint until the
    /// task reaches a terminal state.
    pub async fn follow_task<F>(&self, task_id: Uuid, mut on_event: F) -> Result<TaskStatusResponse>
    where
        F: FnMut(&ProgressEvent),
    {
        let mut machine = SubscriberStateMachine::new(self.policy.clone());

        loop {
            match self.stream_events(task_id, &mut machine, &mut on_event).await {
                Ok(true) => return self.get_status(task_id).await,
                Ok(false) => {
                    tracing::debug!(task_id = %task_id, "Event stream ended without terminal event");
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, error = %e, "Event stream failed");
                }
            }

            match machine.on_disconnect() {
                SubscriberAction::Resubscribe { delay } => {
                    tracing::debug!(
                        task_id = %task_id,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to event stream after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                SubscriberAction::Poll { interval } => {
                    tracing::info!(
                        task_id = %task_id,
                        interval_ms = interval.as_millis() as u64,
                        "Reconnect budget exhausted, falling back to status polling"
                    );
                    loop {
                        let status = self.get_status(task_id).await?;
                        if machine.on_status(&status) {
                            return Ok(status);
                        }
                        tokio::time::sleep(interval).await;
                    }
                }
                SubscriberAction::Stop => return self.get_status(task_id).await,
            }
        }
    }

    /// Consume one SSE connection; returns true if a terminal event arrived
    async fn stream_events<F>(
        &self,
        task_id: Uuid,
        machine: &mut SubscriberStateMachine,
        on_event: &mut F,
    ) -> Result<bool>
    where
        F: FnMut(&ProgressEvent),
    {
        let url = format!("{}/voiceover/events/{}", self.base_url, task_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(Error::NotFound(format!("Task not found: {}", task_id)));
        }
        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "Subscription rejected ({})",
                response.status()
            )));
        }

        machine.on_connected();

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Provider(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            for data in drain_data_lines(&mut buffer) {
                match serde_json::from_str::<ProgressEvent>(&data) {
                    Ok(event) => {
                        on_event(&event);
                        if machine.on_event(&event) {
                            return Ok(true);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(task_id = %task_id, error = %e, "Skipping unparseable SSE payload");
                    }
                }
            }
        }

        Ok(false)
    }
}

/// Pull complete `data:` payloads out of the SSE line buffer
///
/// Leaves any trailing partial line in the buffer for the next chunk.
fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(newline) = buffer.find('\n') {
        let line: String = buffer.drain(..=newline).collect();
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim_start();
            if !data.is_empty() {
                payloads.push(data.to_string());
            }
        }
        // event:/comment/blank lines carry no payload of their own
    }

    payloads
}
