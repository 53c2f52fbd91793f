//! Speech transcription provider client

use serde::Deserialize;
use std::time::Duration;

use super::{classify_status, classify_transport, ProviderError, TranscriptionProvider};

const USER_AGENT: &str = concat!("SceneCast/", env!("CARGO_PKG_VERSION"));

/// Transcription response body
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// HTTP client for the speech transcription provider
///
/// POST {base_url}/v1/transcribe with raw WAV bytes; the response carries
/// the recognized text.
pub struct HttpTranscriptionProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranscriptionProvider {
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
impl TranscriptionProvider for HttpTranscriptionProvider {
    fn name(&self) -> &'static str {
        "transcription-http"
    }

    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/transcribe?language={}", self.base_url, language);

        tracing::debug!(
            language = %language,
            bytes = audio.len(),
            "Requesting transcription"
        );

        let mut request = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(audio.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), message));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        tracing::debug!(
            transcribed_chars = body.text.chars().count(),
            "Transcription received"
        );
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let provider = HttpTranscriptionProvider::new(
            "http://localhost:8802",
            Some("key".to_string()),
            Duration::from_secs(30),
        );
        assert!(provider.is_ok());
    }

    #[test]
    fn response_body_parses() {
        let body: TranscribeResponse =
            serde_json::from_str(r#"{"text": "사과 세 개를 샀습니다"}"#).unwrap();
        assert_eq!(body.text, "사과 세 개를 샀습니다");
    }
}
