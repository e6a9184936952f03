//! Optional on-disk dump of each chat's transcript.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use baatein_core::types::{ChatId, Turn};

use crate::error::ChatError;
use crate::store::Session;

/// File contents of `<dir>/<chat_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTranscript {
    pub chat_id: ChatId,
    pub persona: String,
    pub updated_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

/// Writes one pretty-printed JSON file per chat, overwritten after every
/// committed turn.
#[derive(Debug, Clone)]
pub struct TranscriptArchive {
    dir: PathBuf,
}

impl TranscriptArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, chat_id: ChatId) -> PathBuf {
        self.dir.join(format!("{}.json", chat_id))
    }

    /// Persist the session's transcript. The file is replaced atomically.
    pub async fn write(&self, session: &Session) -> Result<PathBuf, ChatError> {
        let record = ArchivedTranscript {
            chat_id: session.chat_id,
            persona: session.persona.name.clone(),
            updated_at: Utc::now(),
            turns: session.transcript.snapshot().to_vec(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(session.chat_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            chat_id = %session.chat_id,
            path = %path.display(),
            turns = record.turns.len(),
            "Transcript archived"
        );
        Ok(path)
    }

    pub async fn read(&self, chat_id: ChatId) -> Result<ArchivedTranscript, ChatError> {
        let json = tokio::fs::read_to_string(self.path_for(chat_id)).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use baatein_core::types::{Persona, Role};
    use tempfile::TempDir;

    fn session(chat_id: i64) -> Session {
        let persona = Arc::new(Persona {
            name: "Nova".to_string(),
            system_prompt: "You are Nova.".to_string(),
            chat_model: "m".to_string(),
            voice: "v".to_string(),
            tts_model: "t".to_string(),
            sort_order: 0,
        });
        Session::new(ChatId(chat_id), persona)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let archive = TranscriptArchive::new(dir.path().join("transcripts"));

        let mut session = session(-100);
        session.transcript.append(Role::User, "hello");
        session.transcript.append(Role::Assistant, "hi there");

        let path = archive.write(&session).await.unwrap();
        assert_eq!(path, dir.path().join("transcripts").join("-100.json"));

        let record = archive.read(ChatId(-100)).await.unwrap();
        assert_eq!(record.persona, "Nova");
        assert_eq!(record.turns.len(), 3);
        assert_eq!(record.turns[2], Turn::assistant("hi there"));
    }

    #[tokio::test]
    async fn test_file_shape() {
        let dir = TempDir::new().unwrap();
        let archive = TranscriptArchive::new(dir.path());
        let path = archive.write(&session(5)).await.unwrap();

        let raw = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["chat_id"], 5);
        assert_eq!(value["turns"][0]["role"], "system");
        assert!(value["updated_at"].is_string());
        assert!(raw.contains('\n'));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let archive = TranscriptArchive::new(dir.path());
        let mut session = session(1);
        archive.write(&session).await.unwrap();
        session.transcript.append(Role::User, "again");
        archive.write(&session).await.unwrap();

        assert_eq!(archive.read(ChatId(1)).await.unwrap().turns.len(), 2);
        assert!(!dir.path().join("1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let archive = TranscriptArchive::new(dir.path());
        assert!(matches!(archive.read(ChatId(9)).await, Err(ChatError::Io(_))));
    }
}
