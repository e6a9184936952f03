//! Session orchestration: persona selection, turn handling and reset.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use baatein_core::types::{ChatId, Persona, Role, Turn};

use crate::archive::TranscriptArchive;
use crate::catalog::PersonaCatalog;
use crate::error::{ChatError, PipelineError};
use crate::pipeline::TurnPipeline;
use crate::store::{ChatPhase, Session, SessionStore, SharedSession};

/// Speech outcome of a committed turn.
#[derive(Debug)]
pub enum ReplyAudio {
    /// Speech output is disabled.
    Skipped,
    Rendered(Vec<u8>),
    /// Synthesis failed; the text reply still stands.
    Failed(PipelineError),
}

/// Reply to a committed turn.
#[derive(Debug)]
pub struct TurnReply {
    pub text: String,
    /// What was recognized, for voice turns.
    pub heard: Option<String>,
    pub audio: ReplyAudio,
}

/// Owns every chat's session and runs turns through the pipeline.
///
/// Turns on different chats run concurrently; turns on one chat are
/// serialized by that session's lock.
pub struct SessionOrchestrator {
    catalog: Arc<PersonaCatalog>,
    pipeline: TurnPipeline,
    store: SessionStore,
    archive: Option<TranscriptArchive>,
}

impl SessionOrchestrator {
    pub fn new(catalog: Arc<PersonaCatalog>, pipeline: TurnPipeline) -> Self {
        Self {
            catalog,
            pipeline,
            store: SessionStore::new(),
            archive: None,
        }
    }

    /// Dump each chat's transcript after every committed turn.
    pub fn with_archive(mut self, archive: TranscriptArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn pipeline(&self) -> &TurnPipeline {
        &self.pipeline
    }

    pub fn phase(&self, chat_id: ChatId) -> Result<ChatPhase, ChatError> {
        self.store.phase(chat_id)
    }

    /// Open persona choice for a chat. An active session is left untouched.
    pub fn begin(&self, chat_id: ChatId) -> Result<ChatPhase, ChatError> {
        let phase = self.store.mark_awaiting(chat_id)?;
        tracing::debug!(%chat_id, ?phase, "Chat started");
        Ok(phase)
    }

    /// Bind the chat to `name` with a fresh transcript.
    pub fn select_persona(&self, chat_id: ChatId, name: &str) -> Result<Arc<Persona>, ChatError> {
        let persona = match self.catalog.get(name.trim()) {
            Ok(persona) => persona,
            Err(e) => {
                self.store.mark_awaiting(chat_id)?;
                tracing::info!(%chat_id, requested = name, "Unknown persona requested");
                return Err(e);
            }
        };

        self.store
            .insert(Session::new(chat_id, Arc::clone(&persona)))?;
        tracing::info!(%chat_id, persona = %persona.name, "Session started");
        Ok(persona)
    }

    /// Discard the chat's session and return to persona choice. Idempotent.
    pub fn reset(&self, chat_id: ChatId) -> Result<(), ChatError> {
        if self.store.detach(chat_id)? {
            tracing::info!(%chat_id, "Session reset");
        }
        Ok(())
    }

    pub async fn persona(&self, chat_id: ChatId) -> Result<Arc<Persona>, ChatError> {
        let shared = self.store.get(chat_id)?;
        let session = shared.lock().await;
        Ok(Arc::clone(&session.persona))
    }

    /// Copy of the chat's transcript. Waits for any in-flight turn.
    pub async fn transcript(&self, chat_id: ChatId) -> Result<Vec<Turn>, ChatError> {
        let shared = self.store.get(chat_id)?;
        let session = shared.lock().await;
        Ok(session.transcript.snapshot().to_vec())
    }

    /// Run a text turn.
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<TurnReply, ChatError> {
        let shared = self.store.get(chat_id)?;
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %turn_id, %chat_id, kind = "text");

        self.text_turn(&shared, text).instrument(span).await
    }

    /// Run a voice turn: normalize, transcribe, then answer the recognized
    /// text. Nothing is recorded unless recognition succeeds.
    pub async fn handle_audio(&self, chat_id: ChatId, audio: &[u8]) -> Result<TurnReply, ChatError> {
        let shared = self.store.get(chat_id)?;
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %turn_id, %chat_id, kind = "voice");

        self.voice_turn(&shared, audio).instrument(span).await
    }

    async fn text_turn(&self, shared: &SharedSession, text: &str) -> Result<TurnReply, ChatError> {
        let mut session = shared.lock().await;
        self.run_turn(&mut session, text.to_string(), None).await
    }

    async fn voice_turn(&self, shared: &SharedSession, audio: &[u8]) -> Result<TurnReply, ChatError> {
        let mut session = shared.lock().await;
        let encoded = self.pipeline.ingest(audio).await?;
        let heard = self.pipeline.transcribe(&encoded).await?;
        tracing::debug!(heard_len = heard.len(), "Voice note transcribed");
        self.run_turn(&mut session, heard.clone(), Some(heard)).await
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        text: String,
        heard: Option<String>,
    ) -> Result<TurnReply, ChatError> {
        session.transcript.append(Role::User, text);

        let reply = match self
            .pipeline
            .generate(&session.persona, session.transcript.snapshot())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                session.transcript.rollback_last()?;
                tracing::warn!(persona = %session.persona.name, error = %e, "Turn rolled back");
                return Err(e.into());
            }
        };

        session.transcript.append(Role::Assistant, reply.clone());
        self.archive(session).await;

        let audio = match self.pipeline.synthesize(&session.persona, &reply).await {
            Ok(Some(bytes)) => ReplyAudio::Rendered(bytes),
            Ok(None) => ReplyAudio::Skipped,
            Err(e) => ReplyAudio::Failed(e),
        };

        tracing::info!(
            persona = %session.persona.name,
            turns = session.transcript.len(),
            voice = matches!(audio, ReplyAudio::Rendered(_)),
            "Turn committed"
        );
        Ok(TurnReply {
            text: reply,
            heard,
            audio,
        })
    }

    async fn archive(&self, session: &Session) {
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.write(session).await {
                tracing::warn!(chat_id = %session.chat_id, error = %e, "Failed to archive transcript");
            }
        }
    }
}
