//! OpenAI-compatible transcription client (`POST /audio/transcriptions`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use baatein_core::config::OpenAiConfig;
use baatein_core::error::{BaateinError, UpstreamError};

use crate::TranscriptionService;

/// Transcription backend for OpenAI Whisper and compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    /// Create with explicit settings.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BaateinError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BaateinError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Create from the `[openai]` config section.
    pub fn from_config(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self, BaateinError> {
        Self::new(
            config.base_url.clone(),
            api_key,
            config.transcription_model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Extract the transcript from a successful response body.
pub fn parse_transcription(body: &str) -> Result<String, UpstreamError> {
    let parsed: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::bad_input(format!("Unexpected transcription response: {}", e)))?;
    Ok(parsed.text.trim().to_string())
}

#[async_trait]
impl TranscriptionService for OpenAiTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, UpstreamError> {
        if audio.is_empty() {
            return Err(UpstreamError::bad_input(
                "Cannot transcribe empty audio data",
            ));
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| UpstreamError::bad_input(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                UpstreamError::transport(
                    e.is_connect() || e.is_timeout(),
                    format!("Transcription request failed: {}", e),
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            UpstreamError::transport(e.is_timeout(), format!("Failed to read transcription body: {}", e))
        })?;

        if !status.is_success() {
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        let text = parse_transcription(&body)?;
        tracing::debug!(
            model = %self.model,
            audio_bytes = audio.len(),
            text_len = text.len(),
            "Audio transcribed"
        );
        Ok(text)
    }
}
