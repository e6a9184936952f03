//! ElevenLabs text-to-speech client (`POST /v1/text-to-speech/{voice}`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use baatein_core::config::ElevenLabsConfig;
use baatein_core::error::{BaateinError, UpstreamError};

use crate::SpeechSynthesizer;

/// Speech backend for the ElevenLabs HTTP API.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BaateinError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BaateinError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create from the `[elevenlabs]` config section.
    pub fn from_config(
        config: &ElevenLabsConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, BaateinError> {
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Endpoint for one voice; the voice id is percent-encoded as a path segment.
    pub fn endpoint(&self, voice: &str) -> Result<reqwest::Url, UpstreamError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::bad_input(format!("Invalid ElevenLabs base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::bad_input("ElevenLabs base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice]);
        Ok(url)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        model: &str,
    ) -> Result<Vec<u8>, UpstreamError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(UpstreamError::bad_input("Cannot synthesize empty text"));
        }

        let response = self
            .client
            .post(self.endpoint(voice)?)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: model,
            })
            .send()
            .await
            .map_err(|e| {
                UpstreamError::transport(
                    e.is_connect() || e.is_timeout(),
                    format!("Speech request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status.as_u16(), body));
        }

        let audio = response.bytes().await.map_err(|e| {
            UpstreamError::transport(e.is_timeout(), format!("Failed to read speech body: {}", e))
        })?;
        if audio.is_empty() {
            return Err(UpstreamError::bad_input("ElevenLabs returned no audio"));
        }

        tracing::debug!(voice, model, bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}
