//! Text generation: the `TextGenerator` seam and its OpenAI chat client.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use baatein_core::config::OpenAiConfig;
use baatein_core::error::{BaateinError, UpstreamError};
use baatein_core::types::Turn;

// =============================================================================
// Trait
// =============================================================================

/// Produces the next assistant reply for a transcript.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// `turns` starts with the system prompt and ends with the user turn
    /// being answered.
    async fn complete(&self, model: &str, turns: &[Turn]) -> Result<String, UpstreamError>;
}

// =============================================================================
// OpenAI chat completions
// =============================================================================

/// Client for `POST {base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiChat {
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

    pub fn from_config(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self, BaateinError> {
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Extract `choices[0].message.content` from a completion body.
pub fn parse_completion(body: &str) -> Result<String, UpstreamError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::bad_input(format!("Unexpected completion response: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| UpstreamError::bad_input("Completion returned no content"))
}

/// Prefer the API's own error message over the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body)
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn complete(&self, model: &str, turns: &[Turn]) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest {
                model,
                messages: turns,
            })
            .send()
            .await
            .map_err(|e| {
                UpstreamError::transport(
                    e.is_connect() || e.is_timeout(),
                    format!("Completion request failed: {}", e),
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            UpstreamError::transport(e.is_timeout(), format!("Failed to read completion body: {}", e))
        })?;

        if !status.is_success() {
            return Err(UpstreamError::from_status(status.as_u16(), error_message(body)));
        }

        let reply = parse_completion(&body)?;
        tracing::debug!(model, turns = turns.len(), reply_len = reply.len(), "Completion received");
        Ok(reply)
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Generator that answers every request with a fixed reply and records the
/// transcript lengths it was asked about.
#[derive(Debug)]
pub struct MockGenerator {
    reply: String,
    seen: Mutex<Vec<usize>>,
}

impl MockGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Lengths of the transcripts passed to `complete`, in call order.
    pub fn seen(&self) -> Vec<usize> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(&self, _model: &str, turns: &[Turn]) -> Result<String, UpstreamError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(turns.len());
        }
        Ok(self.reply.clone())
    }
}
