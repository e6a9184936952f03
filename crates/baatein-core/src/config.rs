use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BaateinError, Result};

/// Top-level configuration for the Baatein bot.
///
/// Loaded from `~/.baatein/config.toml` by default. Secrets (bot token, API
/// keys) are never stored here; they come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaateinConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub horoscope: HoroscopeConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl BaateinConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BaateinConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Reject values that would make the retry policy or encoder unusable.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(BaateinError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.max_elapsed_secs == 0 {
            return Err(BaateinError::Config(
                "retry.max_elapsed_secs must be greater than 0".to_string(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(BaateinError::Config(
                "audio.sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.audio.channels == 0 {
            return Err(BaateinError::Config(
                "audio.channels must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Name shown in the welcome message.
    pub bot_name: String,
    /// Path to the persona source (JSON).
    pub characters_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bot_name: "Baatein.ai".to_string(),
            characters_path: "characters.json".to_string(),
        }
    }
}

/// Backoff curve applied between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Retry policy applied around every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Wall-clock ceiling across all attempts, in seconds.
    pub max_elapsed_secs: u64,
    pub backoff: BackoffKind,
    /// First (or, for `fixed`, every) delay between attempts.
    pub initial_backoff_ms: u64,
    /// Upper bound for exponential delays.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            max_elapsed_secs: 10,
            backoff: BackoffKind::Exponential,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

/// Voice-note re-encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Path or name of the ffmpeg binary.
    pub ffmpeg_path: String,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// LAME VBR quality (0 best .. 9 worst). Ignored when `bitrate_kbps` is set.
    pub vbr_quality: u8,
    /// Constant bitrate in kbit/s.
    pub bitrate_kbps: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            sample_rate: 44_100,
            channels: 2,
            vbr_quality: 1,
            bitrate_kbps: None,
        }
    }
}

/// OpenAI-compatible transcription and chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Model used for speech-to-text.
    pub transcription_model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            timeout_secs: 60,
        }
    }
}

/// ElevenLabs speech-synthesis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub base_url: String,
    /// Speech model for personas that do not name one.
    pub default_tts_model: String,
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            default_tts_model: "eleven_monolingual_v1".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Whether replies are rendered to speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Telegram Bot API transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

/// Daily horoscope side-feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoroscopeConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for HoroscopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://horoscope-app-api.vercel.app".to_string(),
        }
    }
}

/// Optional transcript dump written after every committed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    /// Directory receiving one `<chat_id>.json` per chat.
    pub dir: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: "transcripts".to_string(),
        }
    }
}
