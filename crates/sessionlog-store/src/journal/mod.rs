//! Durable backing for the per-session event logs.
//!
//! A [`Journal`] hands out one [`SessionJournal`] writer per session so that
//! appends to different sessions never contend on shared I/O state, and
//! replays everything it holds when the store is opened.

pub mod jsonl;
pub mod none;

pub use jsonl::JsonlJournal;
pub use none::NoneJournal;

use crate::error::JournalError;
use crate::types::Event;
use std::path::Path;

/// Events recovered for one session, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredSession {
    pub session_id: String,
    pub events: Vec<Event>,
}

/// Persistence backend for session logs.
pub trait Journal: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Open (or create) the writer for a session. Called once per session,
    /// before its first append.
    fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionJournal>, JournalError>;

    /// Read back every session that holds at least one event.
    fn load(&self) -> Result<Vec<RecoveredSession>, JournalError>;

    /// Health check
    fn health_check(&self) -> bool;
}

/// Append-side handle for a single session's journal.
pub trait SessionJournal: Send {
    /// Durably record `event`. Must either write the whole record or fail.
    fn append(&mut self, event: &Event) -> Result<(), JournalError>;
}

/// Factory: create the journal backend named in config.
pub fn create_journal(kind: &str, data_dir: &Path) -> Result<Box<dyn Journal>, JournalError> {
    match kind {
        "jsonl" => Ok(Box::new(JsonlJournal::open(data_dir)?)),
        "none" | "memory" => Ok(Box::new(NoneJournal::new())),
        other => Err(JournalError::UnknownBackend(other.to_string())),
    }
}
