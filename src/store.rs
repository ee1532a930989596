//! Debounced persistence of document text to a key/value store.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::DocumentError;
use crate::files::write_via_temp;

pub const UPDATED_AT_SUFFIX: &str = ".updated_at";

pub fn updated_at_key(key: &str) -> String {
    format!("{key}{UPDATED_AT_SUFFIX}")
}

pub trait DocumentStore {
    fn load(&self, key: &str) -> Result<Option<String>, DocumentError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), DocumentError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, DocumentError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten through a temp file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn store_error(&self, key: &str, err: impl std::fmt::Display) -> DocumentError {
        DocumentError::Store {
            key: key.to_string(),
            message: format!("{}: {err}", self.path.display()),
        }
    }

    fn read_map(&self, key: &str) -> Result<BTreeMap<String, String>, DocumentError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path).map_err(|err| self.store_error(key, err))?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data).map_err(|err| self.store_error(key, err))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>, DocumentError> {
        Ok(self.read_map(key)?.remove(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        let mut map = self.read_map(key)?;
        map.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&map).map_err(|err| self.store_error(key, err))?;
        write_via_temp(&self.path, json.as_bytes()).map_err(|err| self.store_error(key, err))
    }
}

#[derive(Clone, Debug)]
struct Pending {
    text: String,
    scheduled: Instant,
}

/// Holds the latest text per key and writes it once `delay` has passed since
/// the last change. Store failures are reported on stderr and dropped.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: BTreeMap<String, Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeMap::new(),
        }
    }

    pub fn schedule(&mut self, key: &str, text: &str) {
        self.schedule_at(key, text, Instant::now());
    }

    pub fn schedule_at(&mut self, key: &str, text: &str, now: Instant) {
        self.pending.insert(
            key.to_string(),
            Pending {
                text: text.to_string(),
                scheduled: now,
            },
        );
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn flush_due(&mut self, store: &mut dyn DocumentStore) -> usize {
        self.flush_due_at(store, Instant::now())
    }

    /// Writes every key whose delay elapsed by `now`. Returns how many were
    /// stored successfully.
    pub fn flush_due_at(&mut self, store: &mut dyn DocumentStore, now: Instant) -> usize {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.scheduled) >= self.delay)
            .map(|(key, _)| key.clone())
            .collect();
        self.write_keys(store, due)
    }

    pub fn flush_all(&mut self, store: &mut dyn DocumentStore) -> usize {
        let keys: Vec<String> = self.pending.keys().cloned().collect();
        self.write_keys(store, keys)
    }

    fn write_keys(&mut self, store: &mut dyn DocumentStore, keys: Vec<String>) -> usize {
        let mut written = 0;
        for key in keys {
            let Some(pending) = self.pending.remove(&key) else {
                continue;
            };
            match persist(store, &key, &pending.text) {
                Ok(()) => written += 1,
                Err(err) => eprintln!("warning: {err}"),
            }
        }
        written
    }
}

fn persist(store: &mut dyn DocumentStore, key: &str, text: &str) -> Result<(), DocumentError> {
    store.save(key, text)?;
    let stamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    store.save(&updated_at_key(key), &stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<String>, DocumentError> {
            Ok(None)
        }

        fn save(&mut self, key: &str, _value: &str) -> Result<(), DocumentError> {
            Err(DocumentError::Store {
                key: key.to_string(),
                message: "quota exceeded".into(),
            })
        }
    }

    #[test]
    fn writes_only_after_the_delay() {
        let mut store = MemoryStore::new();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let start = Instant::now();
        debouncer.schedule_at("settings", "a: 1\n", start);
        debouncer.schedule_at("settings", "a: 2\n", start + Duration::from_millis(300));

        let early = start + Duration::from_millis(600);
        assert_eq!(debouncer.flush_due_at(&mut store, early), 0);
        assert!(debouncer.is_pending("settings"));

        let late = start + Duration::from_millis(800);
        assert_eq!(debouncer.flush_due_at(&mut store, late), 1);
        assert_eq!(
            store.load("settings").expect("load").as_deref(),
            Some("a: 2\n")
        );
        let stamp = store
            .load(&updated_at_key("settings"))
            .expect("load")
            .expect("timestamp");
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
        assert!(!debouncer.is_pending("settings"));
    }

    #[test]
    fn store_failures_are_dropped() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.schedule("rules", "foo\n");
        assert_eq!(debouncer.flush_all(&mut BrokenStore), 0);
        assert!(!debouncer.is_pending("rules"));
    }

    #[test]
    fn json_file_store_round_trips_keys() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("store.json");
        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.load("rules").expect("load"), None);
        store.save("rules", "foo\n").expect("save");
        store.save("schedule", "custom: {}\n").expect("save");

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.load("rules").expect("load").as_deref(), Some("foo\n"));
        assert_eq!(
            reopened.load("schedule").expect("load").as_deref(),
            Some("custom: {}\n")
        );
    }

    #[test]
    fn corrupt_store_file_is_a_store_error() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("store.json");
        fs::write(&path, "{not json").expect("seed");
        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load("rules"),
            Err(DocumentError::Store { .. })
        ));
    }
}
