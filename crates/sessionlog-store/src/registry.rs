//! Session registry: the arena of per-session logs, keyed by session id.

use crate::event_log::EventLog;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct RegistryInner {
    /// Session ids in first-seen order.
    order: Vec<String>,
    logs: HashMap<String, Arc<EventLog>>,
}

/// Tracks which sessions exist and owns their event logs.
///
/// A session is registered before its first append, but it is only reported
/// by [`list`](Self::list) and [`exists`](Self::exists) once its log holds an
/// event.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` if absent and return its log. Idempotent.
    pub fn ensure(&self, session_id: &str) -> Arc<EventLog> {
        if let Some(log) = self.inner.read().logs.get(session_id) {
            return Arc::clone(log);
        }

        let mut inner = self.inner.write();
        // Double-check under the write lock.
        if let Some(log) = inner.logs.get(session_id) {
            return Arc::clone(log);
        }
        let log = Arc::new(EventLog::new(session_id.to_string()));
        inner.order.push(session_id.to_string());
        inner.logs.insert(session_id.to_string(), Arc::clone(&log));
        tracing::info!(session_id, "session registered");
        log
    }

    /// Install a log rebuilt from the journal. Replaces nothing: a session
    /// that is already registered keeps its existing log.
    pub(crate) fn restore(&self, log: EventLog) {
        let mut inner = self.inner.write();
        let session_id = log.session_id().to_string();
        if inner.logs.contains_key(&session_id) {
            tracing::warn!(session_id = %session_id, "session already registered, ignoring replay");
            return;
        }
        inner.order.push(session_id.clone());
        inner.logs.insert(session_id, Arc::new(log));
    }

    /// Log for `session_id`, if registered.
    pub fn get(&self, session_id: &str) -> Option<Arc<EventLog>> {
        self.inner.read().logs.get(session_id).cloned()
    }

    /// Session ids holding at least one event, in first-seen order.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter(|id| inner.logs.get(*id).is_some_and(|log| !log.is_empty()))
            .cloned()
            .collect()
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.get(session_id).is_some_and(|log| !log.is_empty())
    }

    /// Every registered log, in first-seen order.
    pub(crate) fn logs(&self) -> Vec<Arc<EventLog>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.logs.get(id).cloned())
            .collect()
    }
}
