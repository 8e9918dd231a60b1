//! TOML-based application configuration.
//!
//! Stores:
//! - Remote judge endpoint, language and per-endpoint timeouts
//! - Retry/backoff policy shared by every network call
//! - Game timing, thresholds and the reference timezone
//!
//! Configuration is stored at `~/.config/factday/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::clock::{ChallengeCalendar, DEFAULT_TIMEZONE};
use crate::error::ConfigError;

/// Remote judge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_30")]
    pub challenge_timeout_secs: u64,
    #[serde(default = "default_10")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_15")]
    pub final_five_timeout_secs: u64,
    #[serde(default = "default_10")]
    pub answer_timeout_secs: u64,
}

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,
    /// Upper bound of random extra delay added to each wait.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Game rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_main_timer")]
    pub main_timer_secs: u32,
    #[serde(default = "default_60")]
    pub hard_mode_main_timer_secs: u32,
    #[serde(default = "default_60")]
    pub final_five_timer_secs: u32,
    #[serde(default = "default_hard_final_five")]
    pub hard_mode_final_five_timer_secs: u32,
    #[serde(default = "default_threshold")]
    pub wrong_guess_threshold: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/factday/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub game: GameConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:3000/api".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_10() -> u64 {
    10
}
fn default_15() -> u64 {
    15
}
fn default_30() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    4000
}
fn default_backoff() -> BackoffKind {
    BackoffKind::Exponential
}
fn default_jitter_ms() -> u64 {
    100
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.into()
}
fn default_main_timer() -> u32 {
    300
}
fn default_60() -> u32 {
    60
}
fn default_hard_final_five() -> u32 {
    30
}
fn default_threshold() -> usize {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            challenge_timeout_secs: 30,
            verify_timeout_secs: 10,
            final_five_timeout_secs: 15,
            answer_timeout_secs: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: default_backoff(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            main_timer_secs: 300,
            hard_mode_main_timer_secs: 60,
            final_five_timer_secs: 60,
            hard_mode_final_five_timer_secs: 30,
            wrong_guess_threshold: 5,
        }
    }
}

impl ApiConfig {
    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn final_five_timeout(&self) -> Duration {
        Duration::from_secs(self.final_five_timeout_secs)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

impl GameConfig {
    /// Main countdown for the given mode.
    pub fn main_timer(&self, hard_mode: bool) -> u32 {
        if hard_mode {
            self.hard_mode_main_timer_secs
        } else {
            self.main_timer_secs
        }
    }

    /// Final Five countdown for the given mode.
    pub fn final_five_timer(&self, hard_mode: bool) -> u32 {
        if hard_mode {
            self.hard_mode_final_five_timer_secs
        } else {
            self.final_five_timer_secs
        }
    }

    pub fn calendar(&self) -> Result<ChallengeCalendar, ConfigError> {
        ChallengeCalendar::from_name(&self.timezone)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.calendar()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.game.wrong_guess_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "game.wrong_guess_threshold".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
