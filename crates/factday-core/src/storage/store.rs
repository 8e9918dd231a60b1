//! Durable key/value store with typed, failure-tolerant access.
//!
//! Reads that fail to deserialize fall back to the caller's default, and
//! writes that fail are logged and dropped. Storage trouble degrades the game
//! instead of ending the session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::database::Database;
use crate::error::StorageError;

/// Raw string storage behind [`DurableStore`].
pub trait KvBackend: Send {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// SQLite-backed storage; survives process restarts.
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the default on-disk database.
    pub fn open() -> Result<Self, StorageError> {
        Ok(Self::new(Database::open()?))
    }

    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(Database::open_at(path)?))
    }
}

impl KvBackend for SqliteBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.db.kv_get(key)?)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.db.kv_set(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.db.kv_delete(key)?)
    }
}

/// In-memory storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.entries.lock() {
            map.insert(key.to_string(), value.to_string());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }
}

impl KvBackend for MemoryBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self
            .entries
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self
            .entries
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self
            .entries
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        map.remove(key);
        Ok(())
    }
}

/// Typed facade over a [`KvBackend`]. Values are stored as JSON.
pub struct DurableStore {
    backend: Box<dyn KvBackend>,
}

impl DurableStore {
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Convenience for tests and ephemeral sessions.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Read `key`, or `default` if it is missing, unreadable or malformed.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    /// Read `key`; `None` if missing, unreadable or malformed.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "discarding unparseable stored value");
                None
            }
        }
    }

    /// Whether `key` holds any value, parseable or not.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.backend.get_raw(key), Ok(Some(_)))
    }

    /// Write `value` under `key`. Failures are logged and swallowed.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize value for storage");
                return;
            }
        };
        if let Err(e) = self.backend.set_raw(key, &json) {
            tracing::warn!(key, error = %e, "storage write failed");
        }
    }

    /// Delete `key`. Failures are logged and swallowed.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            tracing::warn!(key, error = %e, "storage delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        hard: bool,
        streak: u32,
    }

    struct BrokenBackend;

    impl KvBackend for BrokenBackend {
        fn get_raw(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Locked)
        }
        fn set_raw(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Locked)
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Locked)
        }
    }

    #[test]
    fn typed_round_trip() {
        let store = DurableStore::in_memory();
        let prefs = Prefs { hard: true, streak: 4 };
        store.set("prefs", &prefs);
        assert_eq!(store.get("prefs", Prefs { hard: false, streak: 0 }), prefs);
    }

    #[test]
    fn missing_key_returns_default() {
        let store = DurableStore::in_memory();
        assert_eq!(store.get("nope", 7u32), 7);
        assert!(!store.contains("nope"));
    }

    #[test]
    fn corrupt_value_returns_default() {
        let backend = MemoryBackend::new();
        backend.insert_raw("prefs", "{not json");
        let store = DurableStore::new(backend.clone());
        assert_eq!(store.get("prefs", 3u32), 3);
        // The raw value is left alone; only the read degrades.
        assert!(store.contains("prefs"));
    }

    #[test]
    fn unavailable_backend_never_panics() {
        let store = DurableStore::new(BrokenBackend);
        store.set("k", &1u32);
        store.remove("k");
        assert_eq!(store.get("k", 9u32), 9);
    }

    #[test]
    fn remove_deletes_key() {
        let backend = MemoryBackend::new();
        let store = DurableStore::new(backend.clone());
        store.set("k", "v");
        assert!(backend.contains("k"));
        store.remove("k");
        assert!(!backend.contains("k"));
    }

    #[test]
    fn sqlite_backend_persists() {
        let store = DurableStore::new(SqliteBackend::new(Database::open_memory().unwrap()));
        store.set("daily-challenge-date", "2025-09-22");
        assert_eq!(
            store.get_opt::<String>("daily-challenge-date").as_deref(),
            Some("2025-09-22")
        );
    }
}
