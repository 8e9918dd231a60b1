//! # Factday Core Library
//!
//! Game session engine for the Factday daily trivia game. Front ends (the
//! `factday` CLI among them) are thin layers that feed user actions and
//! one-second ticks into a [`SessionEngine`] and render the [`Event`]s it emits.
//!
//! ## Architecture
//!
//! - **Clock**: maps instants to the canonical challenge day in a fixed
//!   reference timezone
//! - **Storage**: SQLite key/value store with versioned migrations, plus
//!   TOML configuration
//! - **Game**: daily reset, legacy import, streak tracking and the session
//!   state machine
//! - **Judge**: HTTP client for the remote verification service, with
//!   timeout and backoff retry on every call
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: reveal/guess/timer/Final Five state machine
//! - [`DailyResetManager`]: decides when a new challenge day begins
//! - [`DurableStore`]: failure-tolerant typed key/value access
//! - [`Judge`]: trait over the remote judge, implemented by [`HttpJudge`]

pub mod clock;
pub mod storage;
pub mod game;
pub mod judge;
pub mod events;
pub mod error;

pub use clock::{ChallengeCalendar, ChallengeDay, Clock, FixedClock, SystemClock};
pub use storage::{Config, Database, DurableStore, MemoryBackend, SqliteBackend};
pub use game::{
    Challenge, DailyResetManager, GuessInput, Outcome, Phase, Rejection, SessionEngine,
    StreakTracker, TransitionReason, UserData,
};
pub use judge::{HttpJudge, Judge, RetryPolicy};
pub use events::Event;
pub use error::{ConfigError, CoreError, JudgeError, StorageError};
