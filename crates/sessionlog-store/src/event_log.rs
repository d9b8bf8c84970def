//! Per-session append-only event log.
//!
//! Writers serialize on `writer`, which owns id/seq/timestamp assignment and
//! the session's journal handle. Built events are published by pushing an
//! `Arc<Event>` under a short write lock on `events`, so readers never wait
//! on journal I/O and never observe a half-built event.

use crate::error::{JournalError, StoreError};
use crate::journal::SessionJournal;
use crate::types::{new_event_id, now_millis, Event};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bounded retry policy for journal writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Sleep between attempts, doubled after each failure.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

struct WriterState {
    next_seq: u64,
    last_timestamp: Option<DateTime<Utc>>,
    journal: Option<Box<dyn SessionJournal>>,
}

/// The ordered event sequence of one session.
pub struct EventLog {
    session_id: String,
    writer: Mutex<WriterState>,
    events: RwLock<Vec<Arc<Event>>>,
    len: AtomicUsize,
}

impl EventLog {
    /// Empty log; the journal writer is opened lazily on first append.
    pub(crate) fn new(session_id: String) -> Self {
        Self {
            session_id,
            writer: Mutex::new(WriterState {
                next_seq: 0,
                last_timestamp: None,
                journal: None,
            }),
            events: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Log rebuilt from journal replay. Events must already be in append order.
    pub(crate) fn recovered(session_id: String, mut events: Vec<Event>) -> Self {
        for (index, event) in events.iter_mut().enumerate() {
            let index = index as u64;
            if event.seq != index {
                tracing::warn!(
                    session_id = %session_id,
                    recorded = event.seq,
                    position = index,
                    "renumbering recovered event"
                );
                event.seq = index;
            }
        }

        let last_timestamp = events.iter().map(|e| e.timestamp).max();
        let count = events.len();
        Self {
            session_id,
            writer: Mutex::new(WriterState {
                next_seq: count as u64,
                last_timestamp,
                journal: None,
            }),
            events: RwLock::new(events.into_iter().map(Arc::new).collect()),
            len: AtomicUsize::new(count),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of published events. Does not take the event lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build, journal, and publish one event at the tail of the log.
    ///
    /// `open_journal` runs at most once per log, under the writer lock, the
    /// first time an append needs the session's journal handle. On failure
    /// nothing is published and the sequence number is not consumed.
    pub(crate) fn append<F>(
        &self,
        payload: serde_json::Value,
        retry: RetryPolicy,
        open_journal: F,
    ) -> Result<Arc<Event>, StoreError>
    where
        F: Fn() -> Result<Box<dyn SessionJournal>, JournalError>,
    {
        let mut writer = self.writer.lock();

        let now = now_millis();
        let timestamp = match writer.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        let event = Event {
            id: new_event_id(),
            session_id: self.session_id.clone(),
            seq: writer.next_seq,
            timestamp,
            payload,
        };

        let attempts = retry.attempts.max(1);
        let mut backoff = retry.backoff;
        let mut attempt = 1;
        loop {
            match write_through(&mut writer.journal, &event, &open_journal) {
                Ok(()) => break,
                Err(source) if attempt >= attempts => {
                    tracing::error!(
                        session_id = %self.session_id,
                        attempts,
                        "journal write failed, append rejected: {source}"
                    );
                    return Err(StoreError::Journal {
                        session_id: self.session_id.clone(),
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        attempt,
                        "journal write failed, retrying: {e}"
                    );
                    std::thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }

        writer.next_seq += 1;
        writer.last_timestamp = Some(timestamp);

        let event = Arc::new(event);
        self.events.write().push(Arc::clone(&event));
        self.len.fetch_add(1, Ordering::Release);

        tracing::debug!(session_id = %self.session_id, seq = event.seq, id = %event.id, "event appended");
        Ok(event)
    }

    /// All published events, oldest first.
    pub fn list(&self) -> Vec<Arc<Event>> {
        self.events.read().clone()
    }

    /// Up to `limit` events starting at `offset`, oldest first.
    pub fn range(&self, offset: usize, limit: usize) -> Vec<Arc<Event>> {
        let events = self.events.read();
        let start = offset.min(events.len());
        let end = start.saturating_add(limit).min(events.len());
        events[start..end].to_vec()
    }

    /// Timestamp of the first event, if any.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.events.read().first().map(|e| e.timestamp)
    }
}

fn write_through<F>(
    journal: &mut Option<Box<dyn SessionJournal>>,
    event: &Event,
    open_journal: &F,
) -> Result<(), JournalError>
where
    F: Fn() -> Result<Box<dyn SessionJournal>, JournalError>,
{
    let handle = match journal.take() {
        Some(handle) => handle,
        None => open_journal()?,
    };
    journal.insert(handle).append(event)
}
