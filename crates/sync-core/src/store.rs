//! Keyed record persistence
//!
//! A [`RecordStore`] keeps records in memory, keyed and ordered, and can
//! optionally mirror them to a JSON file. The file carries a format version
//! for forward compatibility and is read under a shared lock and replaced
//! atomically under an exclusive lock.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sync_fs::{NormalizedPath, io};

use crate::{Error, Result};

const FORMAT_VERSION: &str = "1.0";

/// A record that can be kept in a [`RecordStore`]
pub trait Record: Clone + Serialize + DeserializeOwned + Send {
    /// Unique key of the record within its store
    fn record_key(&self) -> &str;
}

/// On-disk layout of a record file
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: Record")]
struct RecordFile<T> {
    /// Record file format version
    version: String,
    #[serde(default)]
    records: Vec<T>,
}

/// Thread-safe keyed record collection with optional file persistence
#[derive(Debug)]
pub struct RecordStore<T> {
    /// Backing file, `None` for an in-memory store
    path: Option<NormalizedPath>,
    records: Mutex<BTreeMap<String, T>>,
}

impl<T: Record> RecordStore<T> {
    /// Create an empty store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open a file-backed store, loading existing records if the file exists
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the file exists but cannot be decoded.
    pub fn open(path: impl Into<NormalizedPath>) -> Result<Self> {
        let path = path.into();
        let mut records = BTreeMap::new();

        if path.is_file() {
            let content = io::read_locked(&path)?;
            if !content.is_empty() {
                let file: RecordFile<T> =
                    serde_json::from_slice(&content).map_err(|e| Error::Store {
                        path: path.to_native(),
                        message: e.to_string(),
                    })?;
                for record in file.records {
                    records.insert(record.record_key().to_string(), record);
                }
            }
        }

        tracing::debug!(path = %path, count = records.len(), "Opened record store");
        Ok(Self {
            path: Some(path),
            records: Mutex::new(records),
        })
    }

    /// Backing file of this store, if any
    pub fn path(&self) -> Option<&NormalizedPath> {
        self.path.as_ref()
    }

    /// All records ordered by key
    pub fn all(&self) -> Vec<T> {
        self.records.lock().values().cloned().collect()
    }

    /// Get a record by key
    pub fn get(&self, key: &str) -> Option<T> {
        self.records.lock().get(key).cloned()
    }

    /// All records matching a predicate, ordered by key
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.records
            .lock()
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a record and persist the store
    ///
    /// The record becomes visible only once it was persisted.
    pub fn upsert(&self, record: T) -> Result<()> {
        let mut records = self.records.lock();
        let mut staged = records.clone();
        staged.insert(record.record_key().to_string(), record);
        self.persist(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Remove a record by key and persist the store
    ///
    /// Returns the removed record if found, None otherwise. The record stays
    /// in the store if the removal cannot be persisted.
    pub fn remove(&self, key: &str) -> Result<Option<T>> {
        let mut records = self.records.lock();
        if !records.contains_key(key) {
            return Ok(None);
        }
        let mut staged = records.clone();
        let removed = staged.remove(key);
        self.persist(&staged)?;
        *records = staged;
        Ok(removed)
    }

    fn persist(&self, records: &BTreeMap<String, T>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = RecordFile {
            version: FORMAT_VERSION.to_string(),
            records: records.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&file)?;
        io::write_atomic(path, &content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl Record for Note {
        fn record_key(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn in_memory_store_upserts_by_key() {
        let store = RecordStore::in_memory();
        store.upsert(note("b", "first")).unwrap();
        store.upsert(note("a", "second")).unwrap();
        store.upsert(note("b", "third")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("b").unwrap().text, "third");
        // Ordered by key
        assert_eq!(store.all()[0].id, "a");
        assert!(store.path().is_none());
    }

    #[test]
    fn remove_returns_removed_record() {
        let store = RecordStore::in_memory();
        store.upsert(note("a", "x")).unwrap();

        assert_eq!(store.remove("a").unwrap(), Some(note("a", "x")));
        assert_eq!(store.remove("a").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_reloads_persisted_records() {
        let dir = tempdir().unwrap();
        let path = NormalizedPath::new(dir.path().join("notes.json"));

        let store = RecordStore::open(path.clone()).unwrap();
        store.upsert(note("a", "persisted")).unwrap();
        store.upsert(note("b", "removed")).unwrap();
        store.remove("b").unwrap();
        drop(store);

        let reopened: RecordStore<Note> = RecordStore::open(path.clone()).unwrap();
        assert_eq!(reopened.all(), vec![note("a", "persisted")]);

        let raw = std::fs::read_to_string(path.to_native()).unwrap();
        assert!(raw.contains("\"version\": \"1.0\""));
    }

    #[test]
    fn failed_write_leaves_records_unchanged() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state");
        std::fs::create_dir_all(&state).unwrap();

        let store = RecordStore::open(NormalizedPath::new(state.join("notes.json"))).unwrap();
        store.upsert(note("a", "kept")).unwrap();

        // A file where the state directory was makes every write fail
        std::fs::remove_dir_all(&state).unwrap();
        std::fs::write(&state, "").unwrap();

        assert!(store.upsert(note("b", "lost")).is_err());
        assert!(store.upsert(note("a", "changed")).is_err());
        assert!(store.remove("a").is_err());

        assert_eq!(store.all(), vec![note("a", "kept")]);
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<RecordStore<Note>> = RecordStore::open(NormalizedPath::new(&path));
        assert!(matches!(result, Err(Error::Store { .. })));
    }

    #[test]
    fn find_filters_records() {
        let store = RecordStore::in_memory();
        store.upsert(note("a", "keep")).unwrap();
        store.upsert(note("b", "drop")).unwrap();

        let found = store.find(|n| n.text == "keep");
        assert_eq!(found, vec![note("a", "keep")]);
    }
}
