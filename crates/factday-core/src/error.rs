//! Core error types for factday-core.
//!
//! Network and storage failures are typed here. Guard rejections from the
//! session engine are not errors and live in [`crate::game::Rejection`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Anything that can stop the engine from being built or opened.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// A judge call that still failed after its retries.
    #[error("judge: {0}")]
    Judge(#[from] JudgeError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Failures opening or migrating the kv database.
///
/// Only raised while opening or migrating a store. Per-key reads and writes
/// through [`crate::storage::DurableStore`] never surface these.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("kv query: {0}")]
    QueryFailed(String),

    #[error("schema migration: {0}")]
    MigrationFailed(String),

    /// Another process holds the database lock.
    #[error("kv database busy")]
    Locked,

    #[error("no data directory: {0}")]
    DataDir(String),
}

/// Errors from the remote verification service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JudgeError {
    /// The per-attempt timeout elapsed and the request was dropped
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Non-success HTTP status
    #[error("{operation} failed with HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body could not be decoded into the expected contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Final Five returned fewer candidates than required
    #[error("Final Five returned {got} options, at least 5 required")]
    TooFewOptions { got: usize },
}

/// Problems with `config.toml` or a value written to it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("cannot write config {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("bad value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Dot-path that names no field.
    #[error("no such config key: {0}")]
    UnknownKey(String),

    /// Not an IANA zone name.
    #[error("unknown timezone {0}")]
    UnknownTimezone(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode::{DatabaseBusy, DatabaseLocked};
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if matches!(e.code, DatabaseBusy | DatabaseLocked) => {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            JudgeError::InvalidResponse(err.to_string())
        } else {
            JudgeError::Transport(err.to_string())
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_timeout_message_includes_operation() {
        let err = JudgeError::Timeout {
            operation: "verify-guess",
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "verify-guess timed out after 10000ms");
    }

    #[test]
    fn judge_error_lifts_into_core_error() {
        let err: CoreError = JudgeError::TooFewOptions { got: 3 }.into();
        assert!(matches!(err, CoreError::Judge(JudgeError::TooFewOptions { got: 3 })));
    }
}
