use super::{Journal, RecoveredSession, SessionJournal};
use crate::error::JournalError;
use crate::types::Event;

/// Explicit no-op journal.
///
/// Used when `journal = "none"`: events live only in memory for the lifetime
/// of the process while the store wiring stays identical.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneJournal;

impl NoneJournal {
    pub fn new() -> Self {
        Self
    }
}

struct NoneSessionJournal;

impl SessionJournal for NoneSessionJournal {
    fn append(&mut self, _event: &Event) -> Result<(), JournalError> {
        Ok(())
    }
}

impl Journal for NoneJournal {
    fn name(&self) -> &str {
        "none"
    }

    fn open_session(&self, _session_id: &str) -> Result<Box<dyn SessionJournal>, JournalError> {
        Ok(Box::new(NoneSessionJournal))
    }

    fn load(&self) -> Result<Vec<RecoveredSession>, JournalError> {
        Ok(Vec::new())
    }

    fn health_check(&self) -> bool {
        true
    }
}
