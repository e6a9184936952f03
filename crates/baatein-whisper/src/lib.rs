//! Baatein Whisper crate - speech-to-text for incoming voice notes.
//!
//! Provides a trait-based abstraction for transcription, an
//! OpenAI-compatible HTTP client, and a mock implementation for testing
//! without network access.

pub mod openai;

use std::sync::Mutex;

use async_trait::async_trait;

use baatein_core::error::UpstreamError;

pub use openai::OpenAiTranscriber;

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing encoded audio to text.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe an encoded audio payload (MP3 as produced by the ingest
    /// stage) into text.
    async fn transcribe(&self, audio: &[u8]) -> Result<String, UpstreamError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcription service that returns a fixed transcript.
///
/// Records the size of every payload it receives so tests can check what the
/// ingest stage handed over.
#[derive(Debug)]
pub struct MockTranscriptionService {
    text: String,
    received: Mutex<Vec<usize>>,
}

impl Default for MockTranscriptionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscriptionService {
    pub fn new() -> Self {
        Self::with_text("[mock transcription]")
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Byte lengths of the payloads transcribed so far.
    pub fn received(&self) -> Vec<usize> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, UpstreamError> {
        if audio.is_empty() {
            return Err(UpstreamError::bad_input(
                "Cannot transcribe empty audio data",
            ));
        }
        if let Ok(mut received) = self.received.lock() {
            received.push(audio.len());
        }
        tracing::debug!(bytes = audio.len(), "Mock transcription generated");
        Ok(self.text.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use baatein_core::error::UpstreamKind;

    #[tokio::test]
    async fn test_mock_transcription_basic() {
        let service = MockTranscriptionService::new();
        let text = service.transcribe(&[1, 2, 3]).await.unwrap();
        assert_eq!(text, "[mock transcription]");
        assert_eq!(service.received(), vec![3]);
    }

    #[tokio::test]
    async fn test_mock_transcription_custom_text() {
        let service = MockTranscriptionService::with_text("namaste");
        assert_eq!(service.transcribe(&[0; 16]).await.unwrap(), "namaste");
    }

    #[tokio::test]
    async fn test_mock_transcription_empty_audio() {
        let service = MockTranscriptionService::new();
        let err = service.transcribe(&[]).await.unwrap_err();
        assert_eq!(err.kind, UpstreamKind::BadInput);
        assert!(service.received().is_empty());
    }
}
