//! Domain models for the voiceover verification pipeline

mod audio_task;

pub use audio_task::{AudioTask, StateTransition, SynthesisAttempt};
