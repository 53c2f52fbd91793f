//! Shared API types for the voiceover pipeline
//!
//! Request/response bodies and status projections used by both the
//! scenecast-vo service and its clients (console UI, test harnesses).

pub mod types;

pub use types::{
    ErrorKind, PublicStatus, SubmitTaskRequest, SubmitTaskResponse, TaskResultView, TaskState,
    TaskStatusResponse,
};
