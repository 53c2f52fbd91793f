//! scenecast-vo - Verified Voiceover Service
//!
//! **Module identity:**
//! - Name: scenecast-vo (Voiceover)
//! - Default port: 5731
//!
//! Turns production scripts into synthesized voice recordings and proves
//! each recording matches its script within a similarity tolerance,
//! retrying automatically and streaming progress to observers.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scenecast_common::events::EventBus;
use scenecast_vo::providers::{HttpSynthesisProvider, HttpTranscriptionProvider};
use scenecast_vo::{AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Resolve configuration first so the log level can come from it
    let config = ServiceConfig::resolve()
        .map_err(|e| anyhow::anyhow!("Configuration resolution failed: {}", e))?;

    // Initialize tracing (RUST_LOG wins over configured level)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting scenecast-vo (Verified Voiceover) service");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));
    info!("Media directory: {}", config.media_dir.display());

    // Ensure the media directory exists before anything writes into it
    std::fs::create_dir_all(&config.media_dir)?;

    // Database connection pool
    let db_pool = scenecast_vo::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    // Event bus for progress streaming
    let event_bus = EventBus::new(1000);

    // Provider clients
    let synthesis = Arc::new(HttpSynthesisProvider::new(
        config.synthesis_url.clone(),
        config.provider_api_key.clone(),
        config.provider_timeout,
    )?);
    let transcription = Arc::new(HttpTranscriptionProvider::new(
        config.transcription_url.clone(),
        config.provider_api_key.clone(),
        config.provider_timeout,
    )?);
    info!(
        synthesis_url = %config.synthesis_url,
        transcription_url = %config.transcription_url,
        workers = config.worker_count,
        "Providers configured"
    );

    // Application state and router
    let state = AppState::new(db_pool, event_bus, synthesis, transcription, &config);
    let app = scenecast_vo::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
