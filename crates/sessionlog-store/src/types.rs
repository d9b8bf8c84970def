//! Event record and journal header types.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One immutable entry in a session's log.
///
/// `id`, `seq` and `timestamp` are assigned by the store at append time;
/// `payload` is whatever JSON the caller supplied and is never inspected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    /// Zero-based position within the owning session.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Header written as the first line of every JSONL session journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionHeader {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Current wall-clock time at the millisecond precision events carry.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fresh store-wide event id.
pub(crate) fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
