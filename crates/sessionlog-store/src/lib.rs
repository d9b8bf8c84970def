//! Append-only per-session event store.
//!
//! Sessions come into existence with their first event and are never
//! removed. Each session owns an [`EventLog`] with its own writer lock, so
//! appends to different sessions proceed independently, and an optional
//! [`Journal`](journal::Journal) makes the logs survive restarts.

pub mod error;
pub mod event_log;
pub mod journal;
pub mod registry;
pub mod store;
pub mod types;

pub use error::{JournalError, StoreError};
pub use event_log::{EventLog, RetryPolicy};
pub use journal::{create_journal, Journal, JsonlJournal, NoneJournal};
pub use registry::SessionRegistry;
pub use store::{EventStore, StoreStats};
pub use types::{Event, SessionHeader};
