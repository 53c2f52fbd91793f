//! Speech synthesis provider client

use serde::Serialize;
use std::time::Duration;

use super::{classify_status, classify_transport, ProviderError, SynthesisProvider};

const USER_AGENT: &str = concat!("SceneCast/", env!("CARGO_PKG_VERSION"));

/// Synthesis request body
#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    language: &'a str,
}

/// HTTP client for the speech synthesis provider
///
/// POST {base_url}/v1/synthesize with the script, voice, and language;
/// the response body is the audio artifact (WAV bytes).
pub struct HttpSynthesisProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSynthesisProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl SynthesisProvider for HttpSynthesisProvider {
    fn name(&self) -> &'static str {
        "synthesis-http"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = format!("{}/v1/synthesize", self.base_url);

        tracing::debug!(
            voice_id = %voice_id,
            language = %language,
            text_chars = text.chars().count(),
            "Requesting speech synthesis"
        );

        let mut request = self.http_client.post(&url).json(&SynthesizeRequest {
            text,
            voice_id,
            language,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), message));
        }

        let audio = response
            .bytes()
            .await
            .map_err(classify_transport)?
            .to_vec();

        if audio.is_empty() {
            return Err(ProviderError::Parse(
                "synthesis provider returned an empty audio body".to_string(),
            ));
        }

        tracing::debug!(bytes = audio.len(), "Synthesis audio received");
        Ok(audio)
    }
}
