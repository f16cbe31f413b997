//! Local draft persistence: the last-typed answer per question, kept outside
//! the backend so a crashed or reloaded session can recover unsaved input.
//! Drafts are non-authoritative; the backend save always wins.

use std::{fs, io::ErrorKind, path::PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use time::OffsetDateTime;
use tracing::warn;

use crate::state::attempt::QuestionId;

/// A locally persisted answer draft.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEntry {
    /// The answer string as last typed.
    pub answer: String,
    /// When the draft was recorded.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub saved_at: OffsetDateTime,
}

/// Key under which a question's draft is stored.
pub fn draft_key(quiz_id: i64, question_id: QuestionId) -> String {
    format!("quiz-{quiz_id}-question-{question_id}")
}

/// Key-value capability for answer drafts, injected so the engine never
/// touches host storage directly.
pub trait DraftStore: Send + Sync {
    /// Fetch the draft stored under `key`, if any.
    fn get(&self, key: &str) -> Option<DraftEntry>;
    /// Store or replace the draft under `key`.
    fn set(&self, key: &str, entry: DraftEntry);
    /// Remove the draft under `key`, if present.
    fn remove(&self, key: &str);
}

/// Purely in-memory draft store used by tests and as a no-persistence
/// fallback.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: DashMap<String, DraftEntry>,
}

impl MemoryDraftStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> Option<DraftEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, entry: DraftEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Draft store backed by a single JSON file, written through on every
/// change. Write failures are logged and otherwise ignored: drafts are a
/// best-effort safety net, never load-bearing.
#[derive(Debug)]
pub struct FileDraftStore {
    path: PathBuf,
    entries: DashMap<String, DraftEntry>,
}

impl FileDraftStore {
    /// Open the store at `path`, loading any existing drafts. A missing file
    /// starts an empty store; an unreadable one is logged and discarded.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<
                std::collections::HashMap<String, DraftEntry>,
            >(&contents)
            {
                Ok(entries) => entries.into_iter().collect(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to parse draft file; starting empty");
                    DashMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => DashMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read draft file; starting empty");
                DashMap::new()
            }
        };

        Self { path, entries }
    }

    fn persist(&self) {
        let snapshot: std::collections::BTreeMap<String, DraftEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize drafts");
                return;
            }
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(path = %self.path.display(), error = %err, "failed to create draft directory");
            return;
        }

        if let Err(err) = fs::write(&self.path, payload) {
            warn!(path = %self.path.display(), error = %err, "failed to write draft file");
        }
    }
}

impl DraftStore for FileDraftStore {
    fn get(&self, key: &str) -> Option<DraftEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, entry: DraftEntry) {
        self.entries.insert(key.to_string(), entry);
        self.persist();
    }

    fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(answer: &str) -> DraftEntry {
        DraftEntry {
            answer: answer.into(),
            saved_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryDraftStore::new();
        let key = draft_key(1, 42);

        assert!(store.get(&key).is_none());
        store.set(&key, entry("7"));
        assert_eq!(store.get(&key).unwrap().answer, "7");

        store.remove(&key);
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn draft_entry_serializes_timestamp_as_millis() {
        let serialized = serde_json::to_value(entry("7")).unwrap();
        assert_eq!(serialized["saved_at"], 1_700_000_000_000_i64);

        let parsed: DraftEntry = serde_json::from_value(serialized).unwrap();
        assert_eq!(parsed, entry("7"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join("attempt-engine-draft-test");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("drafts.json");

        {
            let store = FileDraftStore::open(path.clone());
            store.set(&draft_key(1, 42), entry("7"));
        }

        let reopened = FileDraftStore::open(path);
        assert_eq!(reopened.get(&draft_key(1, 42)).unwrap().answer, "7");

        let _ = fs::remove_dir_all(&dir);
    }
}
