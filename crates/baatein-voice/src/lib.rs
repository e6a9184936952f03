//! Baatein Voice crate - rendering persona replies to speech.
//!
//! Provides the `SpeechSynthesizer` abstraction, an ElevenLabs client and a
//! mock for tests.

pub mod elevenlabs;

use async_trait::async_trait;

use baatein_core::error::UpstreamError;

pub use elevenlabs::ElevenLabsSynthesizer;

/// Backend that turns reply text into audio bytes (MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` with the given voice and speech model.
    async fn synthesize(&self, text: &str, voice: &str, model: &str)
        -> Result<Vec<u8>, UpstreamError>;
}

/// Mock synthesizer producing a deterministic byte string.
///
/// The output is `voice:model:text` as UTF-8, which lets tests assert that
/// the persona's voice settings were forwarded.
#[derive(Debug, Default, Clone)]
pub struct MockSynthesizer;

impl MockSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        model: &str,
    ) -> Result<Vec<u8>, UpstreamError> {
        if text.trim().is_empty() {
            return Err(UpstreamError::bad_input("Cannot synthesize empty text"));
        }
        Ok(format!("{}:{}:{}", voice, model, text).into_bytes())
    }
}
