//! Schema migrations.
//!
//! Two layers are versioned independently:
//!
//! - the SQLite `kv` table, tracked by the `schema_version` table and upgraded
//!   when the database is opened ([`migrate`]);
//! - the JSON preference blob stored under the `game-store` key, tracked by
//!   its `version` field and upgraded on load ([`migrate_game_store`]).

use rusqlite::{Connection, Result as SqliteResult};
use serde_json::{Map, Value};

use crate::clock::ChallengeDay;

/// Current version of the `game-store` preference blob.
///
/// Increment this when the persisted shape changes.
pub const GAME_STORE_VERSION: u32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: baseline key/value table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    set_schema_version(conn, 1)
}

/// Migration v2: track when each key was last written.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_updated_at: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('kv') WHERE name = 'updated_at'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_updated_at {
        tx.execute_batch("ALTER TABLE kv ADD COLUMN updated_at TEXT NOT NULL DEFAULT '';")?;
    }

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;

    tx.commit()
}

/// Upgrade a `game-store` state object written at `from_version` to
/// [`GAME_STORE_VERSION`].
///
/// Pure and idempotent: running it on already-current data returns the same
/// value.
///
/// - v0/v1 stored `weeklyCompletions` as booleans; `true` becomes
///   `"completed"` and `false` becomes `null`.
/// - v2 adds `weeklyAnchor`, derived from `lastCompletionDate` when present.
pub fn migrate_game_store(state: Value, from_version: u32) -> Value {
    let mut obj = match state {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if from_version < 2 {
        let weekly = obj.remove("weeklyCompletions");
        obj.insert("weeklyCompletions".into(), migrate_weekly(weekly));

        if !obj.contains_key("weeklyAnchor") {
            let anchor = obj
                .get("lastCompletionDate")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<ChallengeDay>().ok())
                .map(|d| Value::String(d.week_start().to_string()))
                .unwrap_or(Value::Null);
            obj.insert("weeklyAnchor".into(), anchor);
        }
    }

    Value::Object(obj)
}

fn migrate_weekly(weekly: Option<Value>) -> Value {
    let mut slots: Vec<Value> = match weekly {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Bool(true) => Value::String("completed".into()),
                Value::Bool(false) | Value::Null => Value::Null,
                Value::String(s) if s == "completed" || s == "failed" => Value::String(s),
                _ => Value::Null,
            })
            .collect(),
        _ => Vec::new(),
    };
    slots.resize(7, Value::Null);
    Value::Array(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn migrate_creates_kv_and_is_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
        conn.execute(
            "INSERT INTO kv (key, value) VALUES ('a', 'b')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn v1_database_gains_updated_at() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute("INSERT INTO kv (key, value) VALUES ('a', 'b')", [])
            .unwrap();
        migrate(&conn).unwrap();
        let updated: String = conn
            .query_row("SELECT updated_at FROM kv WHERE key = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(updated, "");
    }

    #[test]
    fn boolean_completions_become_tri_state() {
        let old = json!({
            "currentStreak": 2,
            "weeklyCompletions": [true, false, true, false, false, false, false],
            "lastCompletionDate": "2025-09-23"
        });
        let new = migrate_game_store(old, 1);
        assert_eq!(
            new["weeklyCompletions"],
            json!(["completed", null, "completed", null, null, null, null])
        );
        assert_eq!(new["weeklyAnchor"], json!("2025-09-21"));
        assert_eq!(new["currentStreak"], json!(2));
    }

    #[test]
    fn migration_is_idempotent() {
        let old = json!({
            "weeklyCompletions": [true, false],
            "lastCompletionDate": null
        });
        let once = migrate_game_store(old, 0);
        let twice = migrate_game_store(once.clone(), 0);
        assert_eq!(once, twice);
        assert_eq!(once["weeklyCompletions"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn current_version_is_untouched() {
        let current = json!({
            "weeklyCompletions": ["failed", null, null, null, null, null, null],
            "weeklyAnchor": "2025-09-21"
        });
        assert_eq!(migrate_game_store(current.clone(), GAME_STORE_VERSION), current);
    }
}
