//! The four turn stages, each wrapped by the retry policy.

use std::sync::Arc;

use baatein_audio::{AudioEncoder, EncodeSpec};
use baatein_core::error::UpstreamError;
use baatein_core::types::{Persona, Turn};
use baatein_voice::SpeechSynthesizer;
use baatein_whisper::TranscriptionService;

use crate::error::{PipelineError, Stage};
use crate::llm::TextGenerator;
use crate::retry::{RetryError, RetryPolicy};

/// Collaborators plus the retry policy shared by every stage.
///
/// Holds no per-chat state, so one pipeline serves all sessions.
pub struct TurnPipeline {
    encoder: Arc<dyn AudioEncoder>,
    transcriber: Arc<dyn TranscriptionService>,
    generator: Arc<dyn TextGenerator>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    retry: RetryPolicy,
    encode_spec: EncodeSpec,
}

impl TurnPipeline {
    /// Pipeline without speech output, default retry policy and encode target.
    pub fn new(
        encoder: Arc<dyn AudioEncoder>,
        transcriber: Arc<dyn TranscriptionService>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            encoder,
            transcriber,
            generator,
            synthesizer: None,
            retry: RetryPolicy::default(),
            encode_spec: EncodeSpec::default(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_encode_spec(mut self, encode_spec: EncodeSpec) -> Self {
        self.encode_spec = encode_spec;
        self
    }

    pub fn speech_enabled(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Normalize raw audio into the transcriber's input format.
    pub async fn ingest(&self, audio: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.retry
            .execute(
                || self.encoder.reencode(audio, &self.encode_spec),
                UpstreamError::is_transient,
            )
            .await
            .map_err(|e| failed(Stage::Ingest, e, PipelineError::EncodingFailed))
    }

    /// Recognize speech. Blank recognition counts as bad input.
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, PipelineError> {
        let text = self
            .retry
            .execute(
                || self.transcriber.transcribe(audio),
                UpstreamError::is_transient,
            )
            .await
            .map_err(|e| failed(Stage::Transcribe, e, PipelineError::TranscriptionFailed))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(failed(
                Stage::Transcribe,
                RetryError::Fatal(UpstreamError::bad_input("No speech recognized")),
                PipelineError::TranscriptionFailed,
            ));
        }
        Ok(text.to_string())
    }

    /// Produce the persona's reply to `turns`.
    pub async fn generate(&self, persona: &Persona, turns: &[Turn]) -> Result<String, PipelineError> {
        let reply = self
            .retry
            .execute(
                || self.generator.complete(&persona.chat_model, turns),
                UpstreamError::is_transient,
            )
            .await
            .map_err(|e| failed(Stage::Generate, e, PipelineError::GenerationFailed))?;

        if reply.trim().is_empty() {
            return Err(failed(
                Stage::Generate,
                RetryError::Fatal(UpstreamError::bad_input("Empty reply")),
                PipelineError::GenerationFailed,
            ));
        }
        Ok(reply)
    }

    /// Render `text` in the persona's voice; `Ok(None)` when speech is off.
    pub async fn synthesize(
        &self,
        persona: &Persona,
        text: &str,
    ) -> Result<Option<Vec<u8>>, PipelineError> {
        let Some(synthesizer) = &self.synthesizer else {
            return Ok(None);
        };
        self.retry
            .execute(
                || synthesizer.synthesize(text, &persona.voice, &persona.tts_model),
                UpstreamError::is_transient,
            )
            .await
            .map(Some)
            .map_err(|e| failed(Stage::Synthesize, e, PipelineError::SynthesisFailed))
    }
}

fn failed(
    stage: Stage,
    err: RetryError<UpstreamError>,
    wrap: fn(RetryError<UpstreamError>) -> PipelineError,
) -> PipelineError {
    tracing::warn!(
        %stage,
        attempts = err.attempts(),
        kind = ?err.last().kind,
        error = %err,
        "Pipeline stage failed"
    );
    wrap(err)
}
