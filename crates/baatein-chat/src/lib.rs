//! Conversation core for Baatein.
//!
//! Binds chats to personas, keeps each chat's transcript, and drives the
//! ingest → transcribe → generate → synthesize turn pipeline with bounded
//! retries and transcript rollback on failure.

pub mod archive;
pub mod catalog;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod store;
pub mod transcript;

pub use archive::{ArchivedTranscript, TranscriptArchive};
pub use catalog::PersonaCatalog;
pub use error::{ChatError, PipelineError, Stage};
pub use llm::{MockGenerator, OpenAiChat, TextGenerator};
pub use orchestrator::{ReplyAudio, SessionOrchestrator, TurnReply};
pub use pipeline::TurnPipeline;
pub use retry::{AttemptTimedOut, Backoff, RetryError, RetryPolicy};
pub use store::{ChatPhase, Session, SessionStore, SharedSession};
pub use transcript::Transcript;
