//! External capability providers
//!
//! Speech synthesis and transcription are network collaborators, not part
//! of this service. Each client classifies failures as transient (worth
//! retrying within the transport budget) or permanent (retrying cannot
//! help), which is what drives the verification loop's decision to burn an
//! attempt versus short-circuiting the whole task.

mod synthesis;
mod transcription;

pub use synthesis::HttpSynthesisProvider;
pub use transcription::HttpTranscriptionProvider;

use scenecast_common::api::types::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout for provider requests (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Default in-call retry budget for transient provider failures
///
/// Distinct from the verification attempt budget: these retries happen
/// inside a single synthesis or transcription step before the step is
/// counted as a failed attempt.
pub const DEFAULT_TRANSPORT_RETRY_ATTEMPTS: u32 = 3;

/// Provider call errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request exceeded the per-call timeout
    #[error("Provider timeout: {0}")]
    Timeout(String),

    /// Provider asked us to back off (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// 5xx-class failure; provider may recover
    #[error("Provider unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Provider rejected the request outright (invalid voice id,
    /// malformed input)
    #[error("Rejected by provider ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Credentials missing or refused
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Response did not match the provider contract
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// True when retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::Unavailable { .. }
                | ProviderError::Network(_)
        )
    }

    /// Attempt-level classification for the task record
    pub fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::ProviderTransient
        } else {
            ErrorKind::ProviderPermanent
        }
    }
}

/// Map an HTTP error status to a provider error
pub(crate) fn classify_status(status: u16, message: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthFailed(message),
        408 => ProviderError::Timeout(message),
        429 => ProviderError::RateLimited(message),
        s if s >= 500 => ProviderError::Unavailable { status: s, message },
        s => ProviderError::Rejected { status: s, message },
    }
}

/// Map a reqwest transport error to a provider error
pub(crate) fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Speech synthesis capability
#[async_trait::async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Provider name for logging and provenance
    fn name(&self) -> &'static str;

    /// Turn text into an audio artifact for the given voice and language
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError>;
}

/// Speech transcription capability
#[async_trait::async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Provider name for logging and provenance
    fn name(&self) -> &'static str;

    /// Turn an audio artifact back into text
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, ProviderError>;
}

/// Retry a provider call on transient failures with exponential backoff
///
/// **Backoff strategy:**
/// - Initial delay: 500ms
/// - Max delay: 5000ms
/// - Multiplier: 2.0 (exponential)
///
/// Permanent errors return immediately without retrying. When the budget
/// is exhausted, the final transient error is returned and the caller
/// counts the step as a failed verification attempt.
pub async fn with_transport_retry<F, Fut, T>(
    operation_name: &str,
    budget: u32,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let budget = budget.max(1);
    let mut backoff = Duration::from_millis(500);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Provider call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && attempt < budget => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    budget,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient provider failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_millis(5000));
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Transport retry budget exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
