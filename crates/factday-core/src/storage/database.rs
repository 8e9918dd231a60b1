//! SQLite-backed key/value table.
//!
//! Every persisted value of the game (recorded day, preference blob, session
//! snapshot, legacy blobs) is a JSON string in the `kv` table. The table
//! schema itself is versioned by [`super::migrations::migrate`].

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use crate::error::StorageError;

/// SQLite database holding the key/value store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// `factday.db` in the data directory, created and migrated on first use.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("factday.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        migrations::migrate(&self.conn)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Upsert; also stamps `updated_at`.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn kv_keys(&self) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_none() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.kv_get("session-id").unwrap(), None);
        db.kv_set("session-id", "\"abc\"").unwrap();
        assert_eq!(db.kv_get("session-id").unwrap().as_deref(), Some("\"abc\""));
    }

    #[test]
    fn kv_set_overwrites() {
        let db = Database::open_memory().unwrap();
        db.kv_set("k", "1").unwrap();
        db.kv_set("k", "2").unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("2"));
        assert_eq!(db.kv_keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn kv_delete_is_idempotent() {
        let db = Database::open_memory().unwrap();
        db.kv_set("k", "v").unwrap();
        db.kv_delete("k").unwrap();
        db.kv_delete("k").unwrap();
        assert!(db.kv_get("k").unwrap().is_none());
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factday.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("daily-challenge-date", "\"2025-09-22\"").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.kv_get("daily-challenge-date").unwrap().as_deref(),
            Some("\"2025-09-22\"")
        );
    }
}
