//! Game data model.
//!
//! Session-scoped state ([`SessionState`], [`TimerState`], [`FinalFiveState`])
//! is replaced wholesale on a daily reset. [`UserData`] is durable and only
//! ever passes through a reset unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ChallengeDay;

/// Recorded text of a skip. Never produced by user input, which arrives as
/// [`GuessInput::Text`].
pub const SKIP_GUESS: &str = "___SKIP___";

/// Shown when the correct answer could not be resolved.
pub const UNKNOWN_ANSWER: &str = "Unknown";

/// One clue of a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FactRepr")]
pub struct Fact {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Facts arrive either as plain strings or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum FactRepr {
    Text(String),
    Detailed {
        content: String,
        #[serde(default)]
        category: Option<String>,
    },
}

impl From<FactRepr> for Fact {
    fn from(repr: FactRepr) -> Self {
        match repr {
            FactRepr::Text(content) => Fact {
                content,
                category: None,
            },
            FactRepr::Detailed { content, category } => Fact { content, category },
        }
    }
}

/// The day's puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub category: String,
    pub facts: Vec<Fact>,
}

/// What the player submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessInput {
    Text(String),
    Skip,
}

impl GuessInput {
    pub fn recorded_text(&self) -> &str {
        match self {
            GuessInput::Text(text) => text,
            GuessInput::Skip => SKIP_GUESS,
        }
    }
}

/// A resolved guess in the session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGuess {
    pub text: String,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_final_five_guess: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

impl UserGuess {
    pub fn is_skip(&self) -> bool {
        self.text == SKIP_GUESS
    }
}

/// Terminal result of a day's play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    StandardWin,
    FinalFiveWin,
    LossFinalFiveWrong,
    LossFinalFiveTime,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::StandardWin | Outcome::FinalFiveWin)
    }
}

/// Why the session left the main guessing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionReason {
    Time,
    Guesses,
}

/// Live, resettable part of a day's play.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub challenge: Option<Challenge>,
    /// Insertion order matters: the last entry is the most recent reveal.
    pub revealed_fact_indices: Vec<usize>,
    pub guesses: Vec<UserGuess>,
    pub is_game_over: bool,
    pub final_five_options: Option<Vec<String>>,
    pub has_seen_clue: bool,
    pub can_reveal_new_clue: bool,
    pub can_make_guess: bool,
    pub outcome: Option<Outcome>,
    pub correct_answer: Option<String>,
    /// User-facing message from the last failed network call.
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            can_reveal_new_clue: true,
            ..Self::default()
        }
    }

    pub fn last_revealed(&self) -> Option<usize> {
        self.revealed_fact_indices.last().copied()
    }

    pub fn has_unrevealed_facts(&self) -> bool {
        self.challenge
            .as_ref()
            .map(|c| self.revealed_fact_indices.len() < c.facts.len())
            .unwrap_or(false)
    }

    /// Wrong main-phase guesses as shown to the player, skips included.
    pub fn displayed_wrong_guesses(&self) -> usize {
        self.guesses
            .iter()
            .filter(|g| !g.is_correct && !g.is_final_five_guess)
            .count()
    }

    /// Wrong main-phase guesses counted toward the Final Five threshold.
    pub fn counted_wrong_guesses(&self) -> usize {
        self.guesses
            .iter()
            .filter(|g| !g.is_correct && !g.is_final_five_guess && !g.is_skip())
            .count()
    }

    /// Case-insensitive match against earlier real guesses.
    pub fn is_duplicate(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        self.guesses
            .iter()
            .filter(|g| !g.is_skip())
            .any(|g| g.text.trim().to_lowercase() == needle)
    }

    /// Guess texts sent to the Final Five endpoint for exclusion.
    pub fn previous_guess_texts(&self) -> Vec<String> {
        self.guesses
            .iter()
            .filter(|g| !g.is_skip())
            .map(|g| g.text.clone())
            .collect()
    }

    pub fn known_correct_answer(&self) -> Option<&str> {
        self.guesses
            .iter()
            .find(|g| g.is_correct)
            .map(|g| g.text.as_str())
    }
}

/// Main countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub time_remaining: u32,
    pub is_active: bool,
    /// Set while a verification round-trip is in flight.
    pub should_pause: bool,
}

impl TimerState {
    pub fn new(initial_secs: u32) -> Self {
        Self {
            time_remaining: initial_secs,
            is_active: false,
            should_pause: false,
        }
    }

    /// One-second step. Returns true on the tick that reaches zero.
    pub fn tick(&mut self) -> bool {
        if !self.is_active || self.should_pause || self.time_remaining == 0 {
            return false;
        }
        self.time_remaining -= 1;
        self.time_remaining == 0
    }
}

/// Bonus-round state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalFiveState {
    pub is_active: bool,
    pub time_remaining: u32,
    pub transition_reason: Option<TransitionReason>,
    pub error: Option<String>,
    pub is_fetching_options: bool,
}

impl FinalFiveState {
    pub fn new(initial_secs: u32) -> Self {
        Self {
            time_remaining: initial_secs,
            ..Self::default()
        }
    }
}

/// Per-weekday result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeeklySlot {
    Completed,
    Failed,
}

/// Sunday-first week of results.
pub type WeeklyCompletions = [Option<WeeklySlot>; 7];

/// Durable user data; survives daily resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserData {
    pub current_streak: u32,
    pub weekly_completions: WeeklyCompletions,
    /// Sunday of the week `weekly_completions` describes.
    pub weekly_anchor: Option<ChallengeDay>,
    pub last_completion_date: Option<ChallengeDay>,
    #[serde(rename = "isHardModeEnabled")]
    pub hard_mode_enabled: bool,
    #[serde(rename = "isAutocompleteEnabled")]
    pub autocomplete_enabled: bool,
}

/// Snapshot of the day's finished game, for the "already played" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayGameData {
    pub outcome: Outcome,
    pub correct_answer: String,
    pub number_of_tries: usize,
    pub time_spent: u32,
    pub completion_date: ChallengeDay,
}

/// Cached puzzle for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedChallenge {
    pub day: ChallengeDay,
    pub challenge: Challenge,
}

/// Everything stored under the `game-store` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedGame {
    #[serde(flatten)]
    pub user: UserData,
    pub today_game_data: Option<TodayGameData>,
    pub today_challenge: Option<CachedChallenge>,
}

impl PersistedGame {
    /// Outcome recorded for `day`, if the game was already finished.
    pub fn completed_on(&self, day: ChallengeDay) -> Option<&TodayGameData> {
        self.today_game_data
            .as_ref()
            .filter(|d| d.completion_date == day)
    }

    pub fn cached_challenge(&self, day: ChallengeDay) -> Option<&Challenge> {
        self.today_challenge
            .as_ref()
            .filter(|c| c.day == day)
            .map(|c| &c.challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guess(text: &str, is_correct: bool) -> UserGuess {
        UserGuess {
            text: text.into(),
            is_correct,
            timestamp: Utc::now(),
            is_final_five_guess: false,
            is_hidden: false,
        }
    }

    #[test]
    fn facts_accept_strings_and_objects() {
        let challenge: Challenge = serde_json::from_value(json!({
            "id": "c1",
            "category": "animals",
            "facts": ["It has stripes", {"content": "It lives in Asia", "category": "habitat"}]
        }))
        .unwrap();
        assert_eq!(challenge.facts[0].content, "It has stripes");
        assert_eq!(challenge.facts[1].category.as_deref(), Some("habitat"));
    }

    #[test]
    fn wrong_guess_counts_treat_skips_differently() {
        let mut session = SessionState::new();
        session.guesses = vec![
            guess("lion", false),
            guess(SKIP_GUESS, false),
            guess("zebra", false),
        ];
        assert_eq!(session.displayed_wrong_guesses(), 3);
        assert_eq!(session.counted_wrong_guesses(), 2);
    }

    #[test]
    fn duplicate_check_ignores_case_and_skips() {
        let mut session = SessionState::new();
        session.guesses = vec![guess("Lion", false), guess(SKIP_GUESS, false)];
        assert!(session.is_duplicate("lion"));
        assert!(session.is_duplicate("  LION "));
        assert!(!session.is_duplicate(SKIP_GUESS));
        assert!(!session.is_duplicate("tiger"));
    }

    #[test]
    fn timer_never_goes_below_zero() {
        let mut timer = TimerState::new(2);
        assert!(!timer.tick());
        timer.is_active = true;
        assert!(!timer.tick());
        assert!(timer.tick());
        assert!(!timer.tick());
        assert_eq!(timer.time_remaining, 0);
    }

    #[test]
    fn paused_timer_holds() {
        let mut timer = TimerState::new(10);
        timer.is_active = true;
        timer.should_pause = true;
        timer.tick();
        assert_eq!(timer.time_remaining, 10);
    }

    #[test]
    fn persisted_game_uses_flat_camel_case_keys() {
        let mut game = PersistedGame::default();
        game.user.hard_mode_enabled = true;
        game.user.current_streak = 3;
        let value = serde_json::to_value(&game).unwrap();
        assert_eq!(value["isHardModeEnabled"], json!(true));
        assert_eq!(value["currentStreak"], json!(3));
        assert_eq!(value["weeklyCompletions"], json!([null, null, null, null, null, null, null]));
        assert_eq!(value["todayGameData"], json!(null));
    }

    #[test]
    fn persisted_game_tolerates_missing_fields() {
        let game: PersistedGame = serde_json::from_value(json!({"currentStreak": 4})).unwrap();
        assert_eq!(game.user.current_streak, 4);
        assert!(!game.user.autocomplete_enabled);
        assert!(game.today_game_data.is_none());
    }

    #[test]
    fn outcome_wire_names() {
        assert_eq!(
            serde_json::to_value(Outcome::LossFinalFiveTime).unwrap(),
            json!("loss-final-five-time")
        );
        assert!(Outcome::FinalFiveWin.is_win());
        assert!(!Outcome::LossFinalFiveWrong.is_win());
    }
}
