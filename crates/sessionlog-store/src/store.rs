use crate::error::{JournalError, StoreError};
use crate::event_log::{EventLog, RetryPolicy};
use crate::journal::Journal;
use crate::registry::SessionRegistry;
use crate::types::Event;

use std::sync::Arc;

/// Session and event counts, as reported by the health route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub sessions: usize,
    pub events: usize,
}

/// Façade over the session registry and the per-session event logs.
///
/// All methods take `&self` and are safe to call from many threads at once;
/// share the store behind an `Arc`.
pub struct EventStore {
    registry: SessionRegistry,
    journal: Box<dyn Journal>,
    retry: RetryPolicy,
}

impl EventStore {
    /// Build a store and replay everything `journal` already holds.
    pub fn open(journal: Box<dyn Journal>, retry: RetryPolicy) -> Result<Self, JournalError> {
        let registry = SessionRegistry::new();
        let recovered = journal.load()?;

        let mut events = 0;
        let sessions = recovered.len();
        for session in recovered {
            events += session.events.len();
            registry.restore(EventLog::recovered(session.session_id, session.events));
        }
        tracing::info!(
            journal = journal.name(),
            sessions,
            events,
            "event store ready"
        );

        Ok(Self {
            registry,
            journal,
            retry,
        })
    }

    /// Store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            registry: SessionRegistry::new(),
            journal: Box::new(crate::journal::NoneJournal::new()),
            retry: RetryPolicy::default(),
        }
    }

    /// Append `payload` to `session_id`, creating the session on first use.
    ///
    /// This is the only write operation. The payload is stored verbatim.
    pub fn create_or_append_event(
        &self,
        session_id: &str,
        payload: serde_json::Value,
    ) -> Result<Arc<Event>, StoreError> {
        if session_id.is_empty() {
            return Err(StoreError::InvalidSessionId);
        }

        let log = self.registry.ensure(session_id);
        log.append(payload, self.retry, || self.journal.open_session(session_id))
    }

    /// Ids of every session holding at least one event, in first-seen order.
    pub fn list_sessions(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Events of `session_id`, oldest first. Unknown sessions yield an empty vec.
    pub fn list_events(&self, session_id: &str) -> Vec<Arc<Event>> {
        self.registry
            .get(session_id)
            .map(|log| log.list())
            .unwrap_or_default()
    }

    /// Up to `limit` events of `session_id` starting at `offset`.
    pub fn list_events_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> Vec<Arc<Event>> {
        self.registry
            .get(session_id)
            .map(|log| log.range(offset, limit))
            .unwrap_or_default()
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.registry.exists(session_id)
    }

    pub fn stats(&self) -> StoreStats {
        let logs = self.registry.logs();
        let events = logs.iter().map(|log| log.len()).sum();
        let sessions = logs.iter().filter(|log| !log.is_empty()).count();
        StoreStats { sessions, events }
    }

    pub fn journal_name(&self) -> &str {
        self.journal.name()
    }

    pub fn journal_healthy(&self) -> bool {
        self.journal.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JsonlJournal;
    use serde_json::json;
    use tempfile::TempDir;

    fn jsonl_store(dir: &TempDir) -> EventStore {
        let journal = JsonlJournal::open(dir.path()).unwrap();
        EventStore::open(Box::new(journal), RetryPolicy::default()).unwrap()
    }

    #[test]
    fn session_started_then_login_scenario() {
        let store = EventStore::in_memory();

        store
            .create_or_append_event("user-123", json!({"message": "Session Started"}))
            .unwrap();
        assert_eq!(store.list_sessions(), vec!["user-123"]);

        store
            .create_or_append_event("user-123", json!({"action": "login"}))
            .unwrap();
        let events = store.list_events("user-123");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload, json!({"message": "Session Started"}));
        assert_eq!(events[1].payload, json!({"action": "login"}));
        assert_ne!(events[0].id, events[1].id);
    }

    #[test]
    fn empty_session_id_is_rejected_without_registering() {
        let store = EventStore::in_memory();
        let err = store.create_or_append_event("", json!({})).unwrap_err();
        assert!(err.is_input_error());
        assert!(store.list_sessions().is_empty());
        assert_eq!(store.stats(), StoreStats { sessions: 0, events: 0 });
    }

    #[test]
    fn unknown_session_reads_empty() {
        let store = EventStore::in_memory();
        assert!(store.list_events("never-seen").is_empty());
        assert!(store.list_events_page("never-seen", 0, 10).is_empty());
        assert!(!store.session_exists("never-seen"));
    }

    #[test]
    fn payload_contents_are_not_special_cased() {
        let store = EventStore::in_memory();
        let payload = json!({"id": "client-id", "timestamp": 1, "session_id": "other"});
        let event = store.create_or_append_event("s", payload.clone()).unwrap();
        assert_eq!(event.payload, payload);
        assert_eq!(event.session_id, "s");
        assert_ne!(event.id, "client-id");
        assert!(store.list_events("other").is_empty());
    }

    #[test]
    fn stats_count_sessions_and_events() {
        let store = EventStore::in_memory();
        store.create_or_append_event("a", json!(1)).unwrap();
        store.create_or_append_event("a", json!(2)).unwrap();
        store.create_or_append_event("b", json!(3)).unwrap();
        assert_eq!(store.stats(), StoreStats { sessions: 2, events: 3 });
    }

    #[test]
    fn reopen_recovers_sessions_and_events() {
        let tmp = TempDir::new().unwrap();
        let before = {
            let store = jsonl_store(&tmp);
            store.create_or_append_event("b-first", json!({"n": 1})).unwrap();
            store.create_or_append_event("a-second", json!({"n": 2})).unwrap();
            store.create_or_append_event("b-first", json!({"n": 3})).unwrap();
            store.list_events("b-first")
        };

        let store = jsonl_store(&tmp);
        assert_eq!(store.list_sessions().len(), 2);
        let after = store.list_events("b-first");
        assert_eq!(after, before);

        let next = store.create_or_append_event("b-first", json!({"n": 4})).unwrap();
        assert_eq!(next.seq, 2);
        assert!(next.timestamp >= after[1].timestamp);
        assert_eq!(jsonl_store(&tmp).list_events("b-first").len(), 3);
    }

    #[test]
    fn very_long_session_id_persists_and_replays() {
        let tmp = TempDir::new().unwrap();
        let id = "x".repeat(300);
        {
            let store = jsonl_store(&tmp);
            store
                .create_or_append_event(&id, json!({"message": "Session Started"}))
                .unwrap();
            store.create_or_append_event(&id, json!({"action": "login"})).unwrap();
            assert_eq!(store.list_sessions(), vec![id.clone()]);
        }

        let store = jsonl_store(&tmp);
        assert_eq!(store.list_sessions(), vec![id.clone()]);
        let events = store.list_events(&id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload, json!({"action": "login"}));
    }

    #[test]
    fn in_memory_store_reports_none_journal() {
        let store = EventStore::in_memory();
        assert_eq!(store.journal_name(), "none");
        assert!(store.journal_healthy());
    }
}
