//! Shared test helpers: scripted providers and state construction

// Not every integration suite uses every helper
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use scenecast_common::events::EventBus;
use scenecast_vo::providers::{ProviderError, SynthesisProvider, TranscriptionProvider};
use scenecast_vo::{AppState, ServiceConfig};

/// Fake WAV payload returned by the scripted synthesis provider
pub const FAKE_WAV: &[u8] = b"RIFF....WAVEfmt fake-audio-for-tests";

/// Synthesis provider that replays a scripted sequence of outcomes
///
/// Once the script is exhausted, every further call succeeds with
/// [`FAKE_WAV`]. Call counts are tracked for retry-accounting assertions.
pub struct ScriptedSynthesis {
    script: Mutex<VecDeque<Result<Vec<u8>, ProviderError>>>,
    pub calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedSynthesis {
    pub fn always_ok() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<Vec<u8>, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    /// Delay every call, to widen cancellation windows in tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SynthesisProvider for ScriptedSynthesis {
    fn name(&self) -> &'static str {
        "scripted-synthesis"
    }

    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
        _language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(FAKE_WAV.to_vec()),
        }
    }
}

/// Transcription provider that replays a scripted sequence of outcomes
///
/// Once the script is exhausted, every further call echoes the configured
/// fallback text (set it to the normalized script for instant acceptance).
pub struct ScriptedTranscription {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: String,
    pub calls: AtomicU32,
}

impl ScriptedTranscription {
    pub fn echoing(fallback: impl Into<String>) -> Self {
        Self::with_script(fallback, Vec::new())
    }

    pub fn with_script(
        fallback: impl Into<String>,
        script: Vec<Result<String, ProviderError>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TranscriptionProvider for ScriptedTranscription {
    fn name(&self) -> &'static str {
        "scripted-transcription"
    }

    async fn transcribe(&self, _audio: &[u8], _language: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Build an AppState over an in-memory database and a temp media dir
///
/// Returns the temp dir guard alongside the state; dropping it deletes
/// the media files.
pub async fn test_state(
    synthesis: Arc<ScriptedSynthesis>,
    transcription: Arc<ScriptedTranscription>,
) -> (AppState, tempfile::TempDir) {
    let media_dir = tempfile::tempdir().expect("temp media dir");

    let config = ServiceConfig {
        bind_address: "127.0.0.1:0".to_string(),
        media_dir: media_dir.path().to_path_buf(),
        database_path: PathBuf::from(":memory:"),
        synthesis_url: "http://unused.invalid".to_string(),
        transcription_url: "http://unused.invalid".to_string(),
        provider_api_key: None,
        worker_count: 4,
        transport_retry_attempts: 2,
        provider_timeout: Duration::from_secs(5),
        log_level: "info".to_string(),
    };

    let db = scenecast_vo::db::init_memory_pool()
        .await
        .expect("in-memory database");
    let event_bus = EventBus::new(256);

    let state = AppState::new(db, event_bus, synthesis, transcription, &config);
    (state, media_dir)
}

/// Poll the registry until the task is terminal or the deadline passes
pub async fn wait_for_terminal(
    state: &AppState,
    task_id: uuid::Uuid,
    deadline: Duration,
) -> scenecast_common::api::types::TaskStatusResponse {
    let started = std::time::Instant::now();
    loop {
        if let Some(status) = state.registry.status(task_id).await {
            if status.is_terminal() {
                return status;
            }
        }
        if started.elapsed() > deadline {
            panic!("task {} did not reach a terminal state in {:?}", task_id, deadline);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
