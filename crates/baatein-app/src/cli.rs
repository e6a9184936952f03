//! CLI argument definitions for the Baatein bot.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use baatein_core::config::BaateinConfig;

/// Baatein: chat with AI characters over Telegram, by text or voice.
#[derive(Parser, Debug)]
#[command(name = "baatein", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the persona catalog (characters.json).
    #[arg(long = "characters")]
    pub characters: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Reply with text only, without speech synthesis.
    #[arg(long = "no-speech")]
    pub no_speech: bool,

    /// Load and validate configuration, catalog and secrets, then exit.
    #[arg(long = "check")]
    pub check: bool,
}

impl CliArgs {
    /// Priority: --config flag > BAATEIN_CONFIG env var > ~/.baatein/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("BAATEIN_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --characters flag > `general.characters_path`.
    pub fn resolve_characters_path(&self, config: &BaateinConfig) -> PathBuf {
        self.characters
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.general.characters_path))
    }

    /// Priority: --log-level flag > LOG_LEVEL > RUST_LOG > config > "info".
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        pick_log_filter(
            self.log_level.as_deref(),
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("RUST_LOG").ok().as_deref(),
            config_level,
        )
    }

    /// Speech is on unless disabled by flag or config.
    pub fn speech_enabled(&self, config: &BaateinConfig) -> bool {
        config.speech.enabled && !self.no_speech
    }
}

fn pick_log_filter(
    flag: Option<&str>,
    log_level_env: Option<&str>,
    rust_log_env: Option<&str>,
    config_level: &str,
) -> String {
    [flag, log_level_env, rust_log_env, Some(config_level)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("info")
        .to_string()
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".baatein").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".baatein").join("config.toml");
    }
    PathBuf::from("config.toml")
}
