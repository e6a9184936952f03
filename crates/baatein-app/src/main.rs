//! Baatein application binary - composition root.
//!
//! 1. Load configuration and initialize logging
//! 2. Load the persona catalog and read secrets from the environment
//! 3. Build the turn pipeline (ffmpeg, Whisper, chat model, ElevenLabs)
//! 4. Poll Telegram until interrupted

mod cli;

use std::sync::Arc;

use clap::Parser;

use baatein_audio::{EncodeSpec, FfmpegEncoder};
use baatein_chat::{
    OpenAiChat, PersonaCatalog, RetryPolicy, SessionOrchestrator, TranscriptArchive, TurnPipeline,
};
use baatein_core::config::BaateinConfig;
use baatein_core::error::BaateinError;
use baatein_telegram::{BotApi, Dispatcher, HoroscopeClient, Poller};
use baatein_voice::ElevenLabsSynthesizer;
use baatein_whisper::OpenAiTranscriber;

use cli::CliArgs;

/// Read a required secret. Blank values count as missing.
fn require_env(name: &str) -> Result<String, BaateinError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BaateinError::MissingEnv(name.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config comes first since it may set the log level.
    let config_file = args.resolve_config_path();
    let config = BaateinConfig::load_or_default(&config_file);

    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        "Starting {} v{}",
        config.general.bot_name,
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Personas.
    let characters = args.resolve_characters_path(&config);
    let catalog = match PersonaCatalog::load_file(&characters, &config.elevenlabs.default_tts_model) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::error!(path = %characters.display(), error = %e, "Failed to load persona catalog");
            return Err(e.into());
        }
    };
    tracing::info!(characters = ?catalog.names(), "Available characters");

    // Secrets.
    let bot_token = require_env("BOT_TOKEN")?;
    let openai_key = require_env("OPENAI_API_KEY")?;
    let speech = args.speech_enabled(&config);
    let eleven_labs_key = if speech {
        Some(require_env("ELEVEN_LABS_API_KEY")?)
    } else {
        None
    };

    // Turn pipeline.
    let mut pipeline = TurnPipeline::new(
        Arc::new(FfmpegEncoder::new(config.audio.ffmpeg_path.clone())),
        Arc::new(OpenAiTranscriber::from_config(&config.openai, openai_key.clone())?),
        Arc::new(OpenAiChat::from_config(&config.openai, openai_key)?),
    )
    .with_retry(RetryPolicy::from_config(&config.retry))
    .with_encode_spec(EncodeSpec::from(&config.audio));

    match eleven_labs_key {
        Some(key) => {
            pipeline = pipeline.with_synthesizer(Arc::new(ElevenLabsSynthesizer::from_config(
                &config.elevenlabs,
                key,
            )?));
        }
        None => tracing::info!("Speech output disabled, replies will be text only"),
    }

    let mut orchestrator = SessionOrchestrator::new(catalog, pipeline);
    if config.archive.enabled {
        tracing::info!(dir = %config.archive.dir, "Transcript archive enabled");
        orchestrator = orchestrator.with_archive(TranscriptArchive::new(&config.archive.dir));
    }

    // Telegram.
    let api = Arc::new(BotApi::from_config(&config.telegram, bot_token)?);
    let mut dispatcher = Dispatcher::new(
        Arc::new(orchestrator),
        Arc::clone(&api) as Arc<dyn baatein_telegram::FileSource>,
        config.general.bot_name.clone(),
    );
    if config.horoscope.enabled {
        dispatcher = dispatcher.with_horoscope(Arc::new(HoroscopeClient::from_config(&config.horoscope)?));
    }

    if args.check {
        tracing::info!(speech, "Configuration check passed");
        return Ok(());
    }

    Poller::new(api, Arc::new(dispatcher))
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!("Stopped");
    Ok(())
}
