//! JSONL journal: one append-only file per session.
//!
//! Files live under `<data_dir>/sessions/` and are named after the hex
//! SHA-256 digest of the session id, so arbitrary caller-chosen ids (slashes,
//! unicode, any length) map to fixed-length file names without being
//! interpreted. The first line of each file is a [`SessionHeader`] carrying
//! the real id; every following line is one [`Event`].

use super::{Journal, RecoveredSession, SessionJournal};
use crate::error::JournalError;
use crate::types::{Event, SessionHeader};

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SESSIONS_DIR: &str = "sessions";
const EXTENSION: &str = "jsonl";

/// File-backed journal rooted at `<data_dir>/sessions`.
#[derive(Debug, Clone)]
pub struct JsonlJournal {
    dir: PathBuf,
}

impl JsonlJournal {
    /// Open the journal, creating `<data_dir>/sessions` if needed.
    pub fn open(data_dir: &Path) -> Result<Self, JournalError> {
        let dir = data_dir.join(SESSIONS_DIR);
        fs::create_dir_all(&dir).map_err(|e| JournalError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Directory holding the per-session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the journal file for `session_id`.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", file_stem_for(session_id)))
    }

    fn read_session_file(&self, path: &Path) -> Result<Option<RecoveredSession>, JournalError> {
        let file = File::open(path).map_err(|e| JournalError::io(path, e))?;
        let reader = BufReader::new(file);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        let mut session_id: Option<String> = None;
        let mut events = Vec::new();
        let mut seen_ids = HashSet::new();

        // Split on raw bytes so a torn multi-byte character only costs its own line.
        for (i, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|e| JournalError::io(path, e))?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            // Lines before the header are leftovers of a torn first write.
            let Some(expected) = session_id.as_deref() else {
                match serde_json::from_slice::<SessionHeader>(&line) {
                    Ok(header) if file_stem_for(&header.session_id) == stem => {
                        session_id = Some(header.session_id);
                    }
                    Ok(_) => tracing::warn!(
                        path = %path.display(),
                        line = i + 1,
                        "skipping header for a session stored elsewhere"
                    ),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        line = i + 1,
                        "skipping line before journal header: {e}"
                    ),
                }
                continue;
            };

            let event: Event = match serde_json::from_slice(&line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = i + 1,
                        "skipping unreadable journal line: {e}"
                    );
                    continue;
                }
            };

            if event.session_id != expected {
                tracing::warn!(
                    path = %path.display(),
                    line = i + 1,
                    "skipping event recorded for another session"
                );
                continue;
            }
            if !seen_ids.insert(event.id.clone()) {
                tracing::warn!(path = %path.display(), id = %event.id, "skipping duplicate event");
                continue;
            }
            events.push(event);
        }

        let Some(session_id) = session_id else {
            return Err(JournalError::Corrupt {
                path: path.to_path_buf(),
                reason: "no session header".into(),
            });
        };
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(RecoveredSession { session_id, events }))
    }
}

fn file_stem_for(session_id: &str) -> String {
    hex::encode(Sha256::digest(session_id.as_bytes()))
}

/// Whether the file already holds the header for `session_id`. Only the
/// lines ahead of the first event are searched, since a header is always
/// written before any event.
fn has_header(file: &mut File, session_id: &str) -> std::io::Result<bool> {
    file.seek(SeekFrom::Start(0))?;
    for line in BufReader::new(&mut *file).split(b'\n') {
        let line = line?;
        if let Ok(header) = serde_json::from_slice::<SessionHeader>(&line) {
            return Ok(header.session_id == session_id);
        }
        if serde_json::from_slice::<Event>(&line).is_ok() {
            return Ok(false);
        }
    }
    Ok(false)
}

/// Writer for one session's journal file.
struct JsonlSessionJournal {
    path: PathBuf,
    session_id: String,
    file: File,
    header_pending: bool,
    /// Set after a failed write; the next record starts on a fresh line so a
    /// torn fragment can never swallow it.
    needs_newline: bool,
}

impl SessionJournal for JsonlSessionJournal {
    fn append(&mut self, event: &Event) -> Result<(), JournalError> {
        let mut buf = Vec::with_capacity(256);
        if self.needs_newline {
            buf.push(b'\n');
        }
        if self.header_pending {
            let header = SessionHeader {
                session_id: self.session_id.clone(),
                created_at: event.timestamp,
            };
            serde_json::to_writer(&mut buf, &header)?;
            buf.push(b'\n');
        }
        serde_json::to_writer(&mut buf, event)?;
        buf.push(b'\n');

        if let Err(e) = self.file.write_all(&buf).and_then(|()| self.file.flush()) {
            self.needs_newline = true;
            return Err(JournalError::io(&self.path, e));
        }

        self.needs_newline = false;
        self.header_pending = false;
        Ok(())
    }
}

impl Journal for JsonlJournal {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionJournal>, JournalError> {
        let path = self.session_path(session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| JournalError::io(&path, e))?;

        let len = file
            .metadata()
            .map_err(|e| JournalError::io(&path, e))?
            .len();

        // A file left behind by a crash may end mid-line, or even mid-header.
        let (needs_newline, header_pending) = if len > 0 {
            let header_present =
                has_header(&mut file, session_id).map_err(|e| JournalError::io(&path, e))?;
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .and_then(|_| file.read_exact(&mut last))
                .map_err(|e| JournalError::io(&path, e))?;
            (last[0] != b'\n', !header_present)
        } else {
            (false, true)
        };

        Ok(Box::new(JsonlSessionJournal {
            path,
            session_id: session_id.to_string(),
            file,
            header_pending,
            needs_newline,
        }))
    }

    fn load(&self) -> Result<Vec<RecoveredSession>, JournalError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| JournalError::io(&self.dir, e))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JournalError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match self.read_session_file(&path) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "journal file holds no events");
                }
                Err(e @ JournalError::Corrupt { .. }) => {
                    tracing::warn!("skipping journal file: {e}");
                }
                // An unreadable file would otherwise be restarted at seq 0 by the next append.
                Err(e) => return Err(e),
            }
        }

        sessions.sort_by(|a, b| {
            a.events[0]
                .timestamp
                .cmp(&b.events[0].timestamp)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }

    fn health_check(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_millis;
    use tempfile::TempDir;

    fn event(session_id: &str, seq: u64, payload: serde_json::Value) -> Event {
        Event {
            id: crate::types::new_event_id(),
            session_id: session_id.into(),
            seq,
            timestamp: now_millis(),
            payload,
        }
    }

    #[test]
    fn append_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();

        let first = event("user-123", 0, serde_json::json!({"message": "Session Started"}));
        let second = event("user-123", 1, serde_json::json!({"action": "login"}));

        let mut writer = journal.open_session("user-123").unwrap();
        writer.append(&first).unwrap();
        writer.append(&second).unwrap();

        let sessions = journal.load().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "user-123");
        assert_eq!(sessions[0].events, vec![first, second]);
    }

    #[test]
    fn first_line_is_header() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let e = event("s", 0, serde_json::json!(1));
        journal.open_session("s").unwrap().append(&e).unwrap();

        let raw = fs::read_to_string(journal.session_path("s")).unwrap();
        let mut lines = raw.lines();
        let header: SessionHeader = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(header.session_id, "s");
        assert_eq!(header.created_at, e.timestamp);
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn reopening_existing_session_does_not_rewrite_header() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        journal
            .open_session("s")
            .unwrap()
            .append(&event("s", 0, serde_json::json!("a")))
            .unwrap();
        journal
            .open_session("s")
            .unwrap()
            .append(&event("s", 1, serde_json::json!("b")))
            .unwrap();

        let raw = fs::read_to_string(journal.session_path("s")).unwrap();
        assert_eq!(raw.lines().count(), 3);
        let sessions = journal.load().unwrap();
        assert_eq!(sessions[0].events.len(), 2);
    }

    #[test]
    fn opaque_session_ids_map_to_safe_file_names() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let id = "../tenant/ü ñ";

        journal
            .open_session(id)
            .unwrap()
            .append(&event(id, 0, serde_json::json!({})))
            .unwrap();

        let path = journal.session_path(id);
        assert_eq!(path.parent().unwrap(), journal.dir());
        assert_eq!(journal.load().unwrap()[0].session_id, id);
    }

    #[test]
    fn file_names_have_fixed_length() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let short = journal.session_path("a");
        let long = journal.session_path(&"ü".repeat(500));
        let name_len = |p: &Path| p.file_name().unwrap().len();
        assert_eq!(name_len(&short), name_len(&long));
        assert_eq!(name_len(&short), 64 + 1 + EXTENSION.len());
    }

    #[test]
    fn torn_header_is_rewritten_on_next_open() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();

        // Crash during the very first write of the session.
        fs::write(journal.session_path("s"), br#"{"session_id":"s","crea"#).unwrap();
        assert!(journal.load().unwrap().is_empty());

        let first = event("s", 0, serde_json::json!({"n": 1}));
        journal.open_session("s").unwrap().append(&first).unwrap();

        let second = event("s", 1, serde_json::json!({"n": 2}));
        journal.open_session("s").unwrap().append(&second).unwrap();

        let raw = fs::read_to_string(journal.session_path("s")).unwrap();
        assert_eq!(raw.matches("created_at").count(), 1, "header written once");

        let sessions = journal.load().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s");
        assert_eq!(sessions[0].events, vec![first, second]);
    }

    #[test]
    fn unreadable_journal_file_fails_load() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        fs::create_dir(journal.dir().join("broken.jsonl")).unwrap();

        assert!(matches!(journal.load(), Err(JournalError::Io { .. })));
    }

    #[test]
    fn file_without_matching_header_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let stray = event("s", 0, serde_json::json!(1));
        fs::write(
            journal.session_path("s"),
            format!("{}\n", serde_json::to_string(&stray).unwrap()),
        )
        .unwrap();
        // A header naming a different session than the file name claims.
        let header = SessionHeader {
            session_id: "other".into(),
            created_at: now_millis(),
        };
        fs::write(
            journal.session_path("mislabelled"),
            format!("{}\n", serde_json::to_string(&header).unwrap()),
        )
        .unwrap();

        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn torn_trailing_line_is_skipped_and_next_append_starts_fresh() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let first = event("s", 0, serde_json::json!({"n": 1}));
        journal.open_session("s").unwrap().append(&first).unwrap();

        // Simulate a crash halfway through the next record.
        let path = journal.session_path("s");
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(br#"{"id":"half","session_"#).unwrap();
        drop(f);

        let sessions = journal.load().unwrap();
        assert_eq!(sessions[0].events, vec![first.clone()]);

        let second = event("s", 1, serde_json::json!({"n": 2}));
        journal.open_session("s").unwrap().append(&second).unwrap();
        let sessions = journal.load().unwrap();
        assert_eq!(sessions[0].events, vec![first, second]);
    }

    #[test]
    fn header_only_file_is_not_a_session() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let header = SessionHeader {
            session_id: "empty".into(),
            created_at: now_millis(),
        };
        fs::write(
            journal.session_path("empty"),
            format!("{}\n", serde_json::to_string(&header).unwrap()),
        )
        .unwrap();

        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn sessions_load_in_first_event_order() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();

        let mut early = event("zeta", 0, serde_json::json!(null));
        early.timestamp = early.timestamp - chrono::Duration::seconds(10);
        let late = event("alpha", 0, serde_json::json!(null));

        journal.open_session("alpha").unwrap().append(&late).unwrap();
        journal.open_session("zeta").unwrap().append(&early).unwrap();

        let ids: Vec<String> = journal
            .load()
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn foreign_events_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        let mut writer = journal.open_session("mine").unwrap();
        writer
            .append(&event("mine", 0, serde_json::json!("ok")))
            .unwrap();
        writer
            .append(&event("theirs", 1, serde_json::json!("stray")))
            .unwrap();

        let sessions = journal.load().unwrap();
        assert_eq!(sessions[0].events.len(), 1);
        assert_eq!(sessions[0].events[0].payload, "ok");
    }

    #[test]
    fn non_jsonl_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        fs::write(journal.dir().join("README.txt"), "not a journal").unwrap();
        assert!(journal.load().unwrap().is_empty());
    }
}
