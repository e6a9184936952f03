//! Per-chat session state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use baatein_core::types::{ChatId, Persona};

use crate::error::ChatError;
use crate::transcript::Transcript;

/// Where a chat is in the persona-selection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatPhase {
    NoSession,
    AwaitingPersonaChoice,
    ActiveSession,
}

/// A chat bound to one persona, with its transcript.
#[derive(Debug)]
pub struct Session {
    pub chat_id: ChatId,
    pub persona: Arc<Persona>,
    pub transcript: Transcript,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(chat_id: ChatId, persona: Arc<Persona>) -> Self {
        let transcript = Transcript::new(persona.system_prompt.clone());
        Self {
            chat_id,
            persona,
            transcript,
            started_at: Utc::now(),
        }
    }
}

/// A session behind its turn lock. Held for the whole of a turn.
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

#[derive(Debug)]
enum Slot {
    Awaiting,
    Active(SharedSession),
}

/// Map from chat to session slot.
///
/// The map lock is only held for lookups and updates, never across an
/// await; turn serialization is the job of each session's own lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<ChatId, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ChatId, Slot>>, ChatError> {
        self.slots
            .lock()
            .map_err(|e| ChatError::SessionStore(format!("session lock poisoned: {}", e)))
    }

    pub fn phase(&self, chat_id: ChatId) -> Result<ChatPhase, ChatError> {
        Ok(match self.lock()?.get(&chat_id) {
            None => ChatPhase::NoSession,
            Some(Slot::Awaiting) => ChatPhase::AwaitingPersonaChoice,
            Some(Slot::Active(_)) => ChatPhase::ActiveSession,
        })
    }

    /// Mark the chat as choosing a persona unless it already has a session.
    pub fn mark_awaiting(&self, chat_id: ChatId) -> Result<ChatPhase, ChatError> {
        let mut slots = self.lock()?;
        let slot = slots.entry(chat_id).or_insert(Slot::Awaiting);
        Ok(match slot {
            Slot::Awaiting => ChatPhase::AwaitingPersonaChoice,
            Slot::Active(_) => ChatPhase::ActiveSession,
        })
    }

    /// Install `session`, replacing whatever the chat had.
    pub fn insert(&self, session: Session) -> Result<SharedSession, ChatError> {
        let chat_id = session.chat_id;
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.lock()?
            .insert(chat_id, Slot::Active(Arc::clone(&shared)));
        Ok(shared)
    }

    pub fn get(&self, chat_id: ChatId) -> Result<SharedSession, ChatError> {
        match self.lock()?.get(&chat_id) {
            Some(Slot::Active(session)) => Ok(Arc::clone(session)),
            _ => Err(ChatError::NoActiveSession(chat_id)),
        }
    }

    /// Drop the chat's session and return it to persona choice. Returns
    /// whether a session was discarded.
    pub fn detach(&self, chat_id: ChatId) -> Result<bool, ChatError> {
        let previous = self.lock()?.insert(chat_id, Slot::Awaiting);
        Ok(matches!(previous, Some(Slot::Active(_))))
    }

    pub fn active_count(&self) -> Result<usize, ChatError> {
        Ok(self
            .lock()?
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count())
    }
}
