mod config;
pub mod database;
pub mod migrations;
pub mod store;

pub use config::{ApiConfig, BackoffKind, Config, GameConfig, RetryConfig};
pub use database::Database;
pub use store::{DurableStore, KvBackend, MemoryBackend, SqliteBackend};

/// Persisted key names.
pub mod keys {
    /// Last recorded challenge day.
    pub const CHALLENGE_DAY: &str = "daily-challenge-date";
    /// Versioned preference and progress blob.
    pub const GAME_STORE: &str = "game-store";
    /// In-progress session for the recorded day.
    pub const SESSION_SNAPSHOT: &str = "session-snapshot";
    /// Client session id sent to the judge.
    pub const SESSION_ID: &str = "session-id";

    pub const LEGACY_STREAK: &str = "streak-data";
    pub const LEGACY_GAME_STATE: &str = "game-state";
    pub const LEGACY_TIMER: &str = "timer-state";
}

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/factday[-dev]/` based on FACTDAY_ENV.
///
/// Set FACTDAY_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FACTDAY_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("factday-dev")
    } else {
        base_dir.join("factday")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
