use std::path::PathBuf;

/// Failures surfaced by the [`EventStore`](crate::EventStore) façade.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session_id must not be empty")]
    InvalidSessionId,
    #[error("journal write for session {session_id:?} failed after {attempts} attempt(s)")]
    Journal {
        session_id: String,
        attempts: u32,
        #[source]
        source: JournalError,
    },
}

impl StoreError {
    /// `true` when the caller sent something the store refuses to accept.
    pub fn is_input_error(&self) -> bool {
        matches!(self, StoreError::InvalidSessionId)
    }
}

/// Failures raised by a [`Journal`](crate::journal::Journal) backend.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding journal record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt journal {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("unknown journal backend {0:?} (expected \"jsonl\" or \"none\")")]
    UnknownBackend(String),
    #[error("{0}")]
    Other(String),
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }
}
