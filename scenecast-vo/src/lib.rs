//! scenecast-vo library interface
//!
//! Voiceover service for the SceneCast production console: verified
//! speech synthesis with a generate → transcribe → score → retry loop,
//! an asynchronous task registry, and streaming progress delivery.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod scoring;
pub mod services;
pub mod utils;

pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use scenecast_common::events::EventBus;

use crate::providers::{SynthesisProvider, TranscriptionProvider};
use crate::registry::TaskRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for progress streaming
    pub event_bus: EventBus,
    /// In-memory task registry (authoritative for live tasks)
    pub registry: TaskRegistry,
    /// Speech synthesis capability
    pub synthesis: Arc<dyn SynthesisProvider>,
    /// Speech transcription capability
    pub transcription: Arc<dyn TranscriptionProvider>,
    /// Fixed-size verification worker pool
    pub worker_slots: Arc<Semaphore>,
    /// Cancellation tokens for running tasks
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Directory holding synthesized audio artifacts
    pub media_dir: PathBuf,
    /// In-call retry budget for transient provider failures
    pub transport_retry_attempts: u32,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        synthesis: Arc<dyn SynthesisProvider>,
        transcription: Arc<dyn TranscriptionProvider>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry: TaskRegistry::new(),
            synthesis,
            transcription,
            worker_slots: Arc::new(Semaphore::new(config.worker_count)),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            media_dir: config.media_dir.clone(),
            transport_retry_attempts: config.transport_retry_attempts,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::voiceover_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .route("/voiceover/events/:task_id", get(api::task_event_stream))
        .with_state(state)
}
