//! Error types for the conversation core.

use baatein_core::error::{UpstreamError, UpstreamKind};
use baatein_core::types::ChatId;

use crate::retry::{AttemptTimedOut, RetryError};

/// Pipeline stage that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Transcribe,
    Generate,
    Synthesize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Ingest => "ingest",
            Stage::Transcribe => "transcribe",
            Stage::Generate => "generate",
            Stage::Synthesize => "synthesize",
        };
        f.write_str(s)
    }
}

/// Terminal failure of one turn-pipeline stage, after retries.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("encoding failed: {0}")]
    EncodingFailed(RetryError<UpstreamError>),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(RetryError<UpstreamError>),
    #[error("generation failed: {0}")]
    GenerationFailed(RetryError<UpstreamError>),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(RetryError<UpstreamError>),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::EncodingFailed(_) => Stage::Ingest,
            PipelineError::TranscriptionFailed(_) => Stage::Transcribe,
            PipelineError::GenerationFailed(_) => Stage::Generate,
            PipelineError::SynthesisFailed(_) => Stage::Synthesize,
        }
    }

    pub fn cause(&self) -> &RetryError<UpstreamError> {
        match self {
            PipelineError::EncodingFailed(e)
            | PipelineError::TranscriptionFailed(e)
            | PipelineError::GenerationFailed(e)
            | PipelineError::SynthesisFailed(e) => e,
        }
    }

    /// Kind of the last upstream failure observed by this stage.
    pub fn upstream_kind(&self) -> UpstreamKind {
        self.cause().last().kind
    }

    pub fn is_retry_exhausted(&self) -> bool {
        self.cause().is_exhausted()
    }
}

/// Errors from the conversation core.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid persona catalog: {0}")]
    Validation(String),
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
    #[error("no active session for chat {0}")]
    NoActiveSession(ChatId),
    #[error("transcript holds only the system turn")]
    EmptyTranscript,
    #[error("turn failed: {0}")]
    TurnFailed(#[from] PipelineError),
    #[error("session store error: {0}")]
    SessionStore(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}

impl From<AttemptTimedOut> for UpstreamError {
    fn from(err: AttemptTimedOut) -> Self {
        UpstreamError::new(UpstreamKind::Network, err.to_string())
    }
}

impl ChatError {
    /// Short text safe to show the person chatting. Never includes internal
    /// detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::UnknownPersona(_) => "Sorry, that character is not available.",
            ChatError::NoActiveSession(_) => {
                "Please choose a character first. Send /start to see who is around."
            }
            ChatError::TurnFailed(PipelineError::EncodingFailed(_))
            | ChatError::TurnFailed(PipelineError::TranscriptionFailed(_)) => {
                "Sorry, I couldn't make out that voice note. Please retry."
            }
            _ => "Something went wrong. Please retry.",
        }
    }
}
