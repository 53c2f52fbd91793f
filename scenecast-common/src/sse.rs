//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for SceneCast services.

use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between keepalive messages on streaming connections (seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Create a heartbeat-only SSE stream for connection status monitoring
///
/// Used by the service-level `/events` endpoint, which has no task scoped
/// to it but still lets a dashboard distinguish a live service from a dead
/// connection.
pub fn create_heartbeat_sse_stream(
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} general events", service_name);

    let stream = async_stream::stream! {
        // Send initial connected status
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::time::sleep(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)).await;
            debug!("SSE: Sending heartbeat");
            yield Ok(Event::default().comment("heartbeat"));
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS))
            .text("heartbeat"),
    )
}
