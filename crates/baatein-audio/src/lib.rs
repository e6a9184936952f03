//! Baatein Audio crate - voice-note normalization before transcription.
//!
//! Provides the `AudioEncoder` abstraction used by the turn pipeline's ingest
//! stage, an ffmpeg-backed implementation, and a mock for testing without an
//! encoder binary.

pub mod ffmpeg;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use baatein_core::config::AudioConfig;
use baatein_core::error::UpstreamError;

pub use ffmpeg::FfmpegEncoder;

// =============================================================================
// Target format
// =============================================================================

/// Bitrate hint handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate {
    /// Variable bitrate at the given LAME quality level (0 best .. 9 worst).
    Vbr(u8),
    /// Constant bitrate in kbit/s.
    Cbr(u32),
}

/// Target format of the normalized audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: Bitrate,
}

impl Default for EncodeSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bitrate: Bitrate::Vbr(1),
        }
    }
}

impl From<&AudioConfig> for EncodeSpec {
    fn from(config: &AudioConfig) -> Self {
        let bitrate = match config.bitrate_kbps {
            Some(kbps) => Bitrate::Cbr(kbps),
            None => Bitrate::Vbr(config.vbr_quality.min(9)),
        };
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bitrate,
        }
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Re-encodes arbitrary incoming audio (e.g. Telegram OGG/Opus voice notes)
/// into the format the transcription service accepts.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Re-encode `input` to `spec`.
    ///
    /// Fails with a non-transient `UpstreamError` on malformed input or when
    /// the encoder is not installed.
    async fn reencode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, UpstreamError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock encoder that returns its input unchanged.
///
/// Counts invocations so tests can assert how often the ingest stage ran.
#[derive(Debug, Default)]
pub struct MockEncoder {
    calls: AtomicUsize,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AudioEncoder for MockEncoder {
    async fn reencode(&self, input: &[u8], spec: &EncodeSpec) -> Result<Vec<u8>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if input.is_empty() {
            return Err(UpstreamError::bad_input("Cannot encode empty audio"));
        }
        tracing::debug!(
            bytes = input.len(),
            sample_rate = spec.sample_rate,
            "Mock re-encode"
        );
        Ok(input.to_vec())
    }
}

// =============================================================================
// Tests
// =============================================================================
