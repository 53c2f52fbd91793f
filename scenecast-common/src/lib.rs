//! Shared types for the SceneCast voiceover services
//!
//! Provides the progress event system, wire-level API types, configuration
//! loading, and the subscriber reconnect state machine used by every
//! SceneCast module that talks to the voiceover pipeline.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod subscriber;

pub use error::{Error, Result};
