//! HTTP API for scenecast-vo

mod health;
mod sse;
mod tasks;

pub use health::{health_check, health_routes};
pub use sse::{event_stream, task_event_stream};
pub use tasks::{cancel_task, download_audio, get_task_status, submit_task, voiceover_routes};
