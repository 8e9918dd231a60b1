use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ChallengeDay;
use crate::game::{Outcome, TransitionReason};

/// Every state change in the session engine produces an Event.
/// The front end renders from these; nothing here is required for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Data from the pre-versioned storage layout was imported.
    LegacyDataMigrated {
        current_streak: u32,
        at: DateTime<Utc>,
    },
    /// A new challenge day began; session state was replaced.
    DailyReset {
        day: ChallengeDay,
        current_streak: u32,
        at: DateTime<Utc>,
    },
    /// An in-progress session for today was restored from storage.
    SessionRestored {
        day: ChallengeDay,
        at: DateTime<Utc>,
    },
    ChallengeLoaded {
        challenge_id: String,
        fact_count: usize,
        from_cache: bool,
        at: DateTime<Utc>,
    },
    ChallengeLoadFailed {
        message: String,
        at: DateTime<Utc>,
    },
    FactRevealed {
        index: usize,
        at: DateTime<Utc>,
    },
    GuessRecorded {
        text: String,
        is_correct: bool,
        is_skip: bool,
        /// Wrong guesses as displayed, skips included.
        wrong_guesses: usize,
        at: DateTime<Utc>,
    },
    VerificationFailed {
        message: String,
        at: DateTime<Utc>,
    },
    TimerExpired {
        at: DateTime<Utc>,
    },
    FinalFiveTransition {
        reason: TransitionReason,
        at: DateTime<Utc>,
    },
    FinalFiveStarted {
        options: Vec<String>,
        time_remaining: u32,
        at: DateTime<Utc>,
    },
    FinalFiveError {
        message: String,
        at: DateTime<Utc>,
    },
    FinalFiveTimedOut {
        at: DateTime<Utc>,
    },
    OptionSelected {
        option: String,
        is_correct: bool,
        at: DateTime<Utc>,
    },
    AnswerRevealed {
        answer: String,
        /// False when the answer could not be resolved and a placeholder is shown.
        resolved: bool,
        at: DateTime<Utc>,
    },
    GameOver {
        outcome: Outcome,
        correct_answer: String,
        current_streak: u32,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        hard_mode: bool,
        autocomplete: bool,
        at: DateTime<Utc>,
    },
}
