//! Session engine for one day's challenge.
//!
//! The engine owns the in-memory session and drives it through:
//!
//! ```text
//! Loading -> Playing <-> AwaitingVerification
//!         -> FinalFiveTransition -> FinalFiveActive <-> AwaitingSelection
//!         -> RevealingAnswer -> GameOver
//! ```
//!
//! It has no internal threads or intervals. The caller feeds it actions and
//! calls [`SessionEngine::tick`] once per second.
//!
//! Every network-backed action comes in two halves. `begin_*` validates the
//! guards, moves into the in-flight phase and returns a pending ticket;
//! `complete_*` applies the result. A ticket issued before a daily reset is
//! ignored on completion. The `async` helpers (`submit_guess`,
//! `select_option`, ...) run both halves around the [`Judge`] call.
//!
//! Events accumulate until drained with [`SessionEngine::take_events`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::legacy;
use super::model::{
    CachedChallenge, Challenge, FinalFiveState, GuessInput, Outcome, PersistedGame, SessionState,
    TimerState, TodayGameData, TransitionReason, UserData, UserGuess, SKIP_GUESS,
    UNKNOWN_ANSWER,
};
use super::persist;
use super::reset::{DailyResetManager, ResetPatch};
use super::streak::StreakTracker;
use crate::clock::{ChallengeCalendar, ChallengeDay, Clock};
use crate::error::{ConfigError, JudgeError};
use crate::events::Event;
use crate::judge::{Judge, FINAL_FIVE_OPTIONS};
use crate::storage::{keys, Config, DurableStore, GameConfig};

/// Where the session is. In-flight network calls are phases of their own, so
/// a second submission while one is outstanding cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Playing,
    AwaitingVerification { token: u64 },
    FinalFiveTransition { reason: TransitionReason },
    FinalFiveActive,
    AwaitingSelection { token: u64 },
    RevealingAnswer { outcome: Outcome },
    GameOver { outcome: Outcome },
}

impl Phase {
    pub fn is_game_over(&self) -> bool {
        matches!(self, Phase::GameOver { .. })
    }

    fn is_final_five(&self) -> bool {
        matches!(
            self,
            Phase::FinalFiveTransition { .. }
                | Phase::FinalFiveActive
                | Phase::AwaitingSelection { .. }
        )
    }
}

/// A guarded action that was refused. The session is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("reveal a clue before guessing")]
    NoClueSeen,
    #[error("a guess is not allowed right now")]
    GuessNotAllowed,
    #[error("a submission is already being verified")]
    VerificationInFlight,
    #[error("already guessed")]
    DuplicateGuess,
    #[error("guess is empty")]
    EmptyGuess,
    #[error("that text is reserved for skips")]
    ReservedGuess,
    #[error("a new clue cannot be revealed right now")]
    RevealNotAllowed,
    #[error("fact already revealed")]
    FactAlreadyRevealed,
    #[error("no fact at that index")]
    FactOutOfRange,
    #[error("not available in the current phase")]
    NotPlaying,
    #[error("not one of the offered options")]
    UnknownOption,
    #[error("a fetch is already in flight")]
    FetchInFlight,
    #[error("today's game is over")]
    GameOver,
}

/// Ticket for an in-flight guess verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGuess {
    generation: u64,
    token: u64,
    challenge_id: String,
    input: GuessInput,
}

impl PendingGuess {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    pub fn text(&self) -> &str {
        self.input.recorded_text()
    }

    pub fn is_skip(&self) -> bool {
        self.input == GuessInput::Skip
    }
}

/// Ticket for an in-flight Final Five options fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOptions {
    generation: u64,
    token: u64,
    challenge_id: String,
    previous_guesses: Vec<String>,
}

impl PendingOptions {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    /// Full guess history at the moment the fetch began, skips excluded.
    pub fn previous_guesses(&self) -> &[String] {
        &self.previous_guesses
    }
}

/// Ticket for an in-flight Final Five selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    generation: u64,
    token: u64,
    challenge_id: String,
    option: String,
}

impl PendingSelection {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    pub fn option(&self) -> &str {
        &self.option
    }
}

/// Ticket for the answer lookup after a Final Five loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    generation: u64,
    token: u64,
    challenge_id: String,
    outcome: Outcome,
    known: Option<String>,
}

impl PendingAnswer {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    /// Correct answer already present in the guess history, if any.
    pub fn known_answer(&self) -> Option<&str> {
        self.known.as_deref()
    }
}

/// Persisted in-progress session, for resuming after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub day: ChallengeDay,
    pub phase: Phase,
    pub session: SessionState,
    pub timer: TimerState,
    pub final_five: FinalFiveState,
}

/// Read-only view for front ends.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView<'a> {
    pub day: ChallengeDay,
    #[serde(flatten)]
    pub phase: Phase,
    pub session: &'a SessionState,
    pub timer: &'a TimerState,
    pub final_five: &'a FinalFiveState,
    /// Wrong guesses as displayed, skips included.
    pub wrong_guesses: usize,
    /// Wrong guesses counted toward the Final Five threshold.
    pub counted_wrong_guesses: usize,
    pub user: &'a UserData,
    pub today_game_data: Option<&'a TodayGameData>,
}

pub struct SessionEngine {
    judge: Arc<dyn Judge>,
    store: DurableStore,
    clock: Arc<dyn Clock>,
    calendar: ChallengeCalendar,
    timing: GameConfig,
    reset_manager: DailyResetManager,
    day: ChallengeDay,
    phase: Phase,
    session: SessionState,
    timer: TimerState,
    final_five: FinalFiveState,
    game: PersistedGame,
    /// Bumped on every daily reset; tickets from older generations are stale.
    generation: u64,
    next_token: u64,
    options_token: Option<u64>,
    answer_token: Option<u64>,
    events: Vec<Event>,
}

impl SessionEngine {
    /// Build an engine over `store`. Call [`bootstrap`](Self::bootstrap)
    /// before feeding it actions.
    pub fn new(
        judge: Arc<dyn Judge>,
        store: DurableStore,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let calendar = config.game.calendar()?;
        let timing = config.game.clone();
        let game = persist::load_game(&store);
        let day = calendar.current_day(clock.as_ref());
        let hard = game.user.hard_mode_enabled;

        Ok(Self {
            judge,
            store,
            clock,
            calendar,
            timer: TimerState::new(timing.main_timer(hard)),
            final_five: FinalFiveState::new(timing.final_five_timer(hard)),
            timing,
            reset_manager: DailyResetManager::new(calendar),
            day,
            phase: Phase::Loading,
            session: SessionState::new(),
            game,
            generation: 0,
            next_token: 0,
            options_token: None,
            answer_token: None,
            events: Vec::new(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn day(&self) -> ChallengeDay {
        self.day
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    pub fn final_five(&self) -> &FinalFiveState {
        &self.final_five
    }

    pub fn user(&self) -> &UserData {
        &self.game.user
    }

    pub fn today_game_data(&self) -> Option<&TodayGameData> {
        self.game.completed_on(self.day)
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    pub fn calendar(&self) -> &ChallengeCalendar {
        &self.calendar
    }

    pub fn status(&self) -> SessionView<'_> {
        SessionView {
            day: self.day,
            phase: self.phase,
            session: &self.session,
            timer: &self.timer,
            final_five: &self.final_five,
            wrong_guesses: self.session.displayed_wrong_guesses(),
            counted_wrong_guesses: self.session.counted_wrong_guesses(),
            user: &self.game.user,
            today_game_data: self.today_game_data(),
        }
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn guard_finished(&self) -> Result<(), Rejection> {
        match self.phase {
            Phase::GameOver { .. } | Phase::RevealingAnswer { .. } => Err(Rejection::GameOver),
            _ => Ok(()),
        }
    }

    fn challenge_id(&self) -> Result<String, Rejection> {
        self.session
            .challenge
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or(Rejection::NotPlaying)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Legacy import, then the daily reset check, then resume of today's
    /// snapshot if no reset fired.
    pub fn bootstrap(&mut self) {
        if let Some(legacy) = legacy::migrate_legacy(&self.store) {
            legacy.merge_into(&mut self.game.user);
            persist::save_game(&self.store, &self.game);
            self.emit(Event::LegacyDataMigrated {
                current_streak: self.game.user.current_streak,
                at: self.now(),
            });
        }

        if self.check_daily_reset() {
            return;
        }

        self.day = self.calendar.current_day(self.clock.as_ref());
        if let Some(snapshot) = self.store.get_opt::<SessionSnapshot>(keys::SESSION_SNAPSHOT) {
            self.restore(snapshot);
        }

        if let Some(done) = self.game.completed_on(self.day).cloned() {
            self.session.is_game_over = true;
            self.session.outcome = Some(done.outcome);
            self.session.correct_answer = Some(done.correct_answer);
            self.session.can_make_guess = false;
            self.session.can_reveal_new_clue = false;
            self.timer.is_active = false;
            self.final_five.is_active = false;
            self.phase = Phase::GameOver {
                outcome: done.outcome,
            };
        }
    }

    /// Run the daily reset check. Returns true if a reset was applied.
    pub fn check_daily_reset(&mut self) -> bool {
        let patch = self.reset_manager.check(
            &self.store,
            self.clock.as_ref(),
            &self.game,
            &self.timing,
        );
        match patch {
            Some(patch) => {
                self.apply_reset(patch);
                true
            }
            None => false,
        }
    }

    fn apply_reset(&mut self, patch: ResetPatch) {
        self.game = patch.persisted();
        self.day = patch.day;
        self.session = patch.session;
        self.timer = patch.timer;
        self.final_five = patch.final_five;
        self.phase = Phase::Loading;
        self.generation += 1;
        self.options_token = None;
        self.answer_token = None;

        persist::save_game(&self.store, &self.game);
        self.store.remove(keys::SESSION_SNAPSHOT);
        self.emit(Event::DailyReset {
            day: self.day,
            current_streak: self.game.user.current_streak,
            at: self.now(),
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            day: self.day,
            phase: self.phase,
            session: self.session.clone(),
            timer: self.timer,
            final_five: self.final_five.clone(),
        }
    }

    pub fn save_snapshot(&self) {
        self.store.set(keys::SESSION_SNAPSHOT, &self.snapshot());
    }

    /// Adopt a snapshot taken earlier today. In-flight phases fall back to
    /// the phase they were entered from, since their calls did not survive.
    /// Returns false (and changes nothing) for another day's snapshot.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> bool {
        if snapshot.day != self.day {
            return false;
        }
        self.session = snapshot.session;
        self.timer = snapshot.timer;
        self.final_five = snapshot.final_five;
        self.phase = match snapshot.phase {
            Phase::AwaitingVerification { .. } => Phase::Playing,
            Phase::AwaitingSelection { .. } => Phase::FinalFiveActive,
            other => other,
        };
        self.timer.should_pause = false;
        self.final_five.is_fetching_options = false;
        self.options_token = None;
        self.answer_token = None;

        self.emit(Event::SessionRestored {
            day: self.day,
            at: self.now(),
        });
        true
    }

    // ── Challenge ────────────────────────────────────────────────────

    /// Load today's challenge, from the cache when possible. A failure leaves
    /// the session in `Loading` with `last_error` set.
    pub async fn load_challenge(&mut self) -> Result<(), Rejection> {
        self.guard_finished()?;
        if self.phase != Phase::Loading {
            return Ok(());
        }

        if let Some(cached) = self.game.cached_challenge(self.day).cloned() {
            self.apply_challenge(cached, true);
            return Ok(());
        }

        let judge = Arc::clone(&self.judge);
        match judge.fetch_daily_challenge().await {
            Ok(challenge) => self.apply_challenge(challenge, false),
            Err(e) => {
                let message = e.to_string();
                self.session.last_error = Some(message.clone());
                self.emit(Event::ChallengeLoadFailed {
                    message,
                    at: self.now(),
                });
            }
        }
        Ok(())
    }

    fn apply_challenge(&mut self, challenge: Challenge, from_cache: bool) {
        let event = Event::ChallengeLoaded {
            challenge_id: challenge.id.clone(),
            fact_count: challenge.facts.len(),
            from_cache,
            at: self.now(),
        };
        if !from_cache {
            self.game.today_challenge = Some(CachedChallenge {
                day: self.day,
                challenge: challenge.clone(),
            });
            persist::save_game(&self.store, &self.game);
        }
        self.session.challenge = Some(challenge);
        self.session.last_error = None;
        self.phase = Phase::Playing;
        self.emit(event);
    }

    // ── Reveal & guess ───────────────────────────────────────────────

    /// Reveal the fact at `index`. The main timer starts on the first reveal.
    pub fn reveal_fact(&mut self, index: usize) -> Result<(), Rejection> {
        self.guard_finished()?;
        match self.phase {
            Phase::Playing => {}
            Phase::AwaitingVerification { .. } => return Err(Rejection::VerificationInFlight),
            _ => return Err(Rejection::NotPlaying),
        }
        let fact_count = self
            .session
            .challenge
            .as_ref()
            .map(|c| c.facts.len())
            .unwrap_or(0);
        if index >= fact_count {
            return Err(Rejection::FactOutOfRange);
        }
        if self.session.revealed_fact_indices.contains(&index) {
            return Err(Rejection::FactAlreadyRevealed);
        }
        if !self.session.can_reveal_new_clue {
            return Err(Rejection::RevealNotAllowed);
        }

        self.session.revealed_fact_indices.push(index);
        self.session.has_seen_clue = true;
        self.session.can_reveal_new_clue = false;
        self.session.can_make_guess = true;
        self.timer.is_active = true;
        self.emit(Event::FactRevealed {
            index,
            at: self.now(),
        });
        Ok(())
    }

    /// Validate a guess and move into `AwaitingVerification`. The main timer
    /// is paused until [`complete_guess`](Self::complete_guess).
    pub fn begin_guess(&mut self, input: GuessInput) -> Result<PendingGuess, Rejection> {
        self.guard_finished()?;
        match self.phase {
            Phase::Playing => {}
            Phase::AwaitingVerification { .. } => return Err(Rejection::VerificationInFlight),
            _ => return Err(Rejection::NotPlaying),
        }
        if !self.session.has_seen_clue {
            return Err(Rejection::NoClueSeen);
        }
        if !self.session.can_make_guess {
            return Err(Rejection::GuessNotAllowed);
        }
        let input = match input {
            GuessInput::Text(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(Rejection::EmptyGuess);
                }
                if text.eq_ignore_ascii_case(SKIP_GUESS) {
                    return Err(Rejection::ReservedGuess);
                }
                if self.session.is_duplicate(&text) {
                    return Err(Rejection::DuplicateGuess);
                }
                GuessInput::Text(text)
            }
            GuessInput::Skip => GuessInput::Skip,
        };

        let challenge_id = self.challenge_id()?;
        let token = self.issue_token();
        self.phase = Phase::AwaitingVerification { token };
        self.timer.should_pause = true;
        Ok(PendingGuess {
            generation: self.generation,
            token,
            challenge_id,
            input,
        })
    }

    /// Apply a verification result. Stale tickets are ignored.
    pub fn complete_guess(&mut self, pending: PendingGuess, result: Result<bool, JudgeError>) {
        if pending.generation != self.generation
            || self.phase != (Phase::AwaitingVerification { token: pending.token })
        {
            tracing::debug!(token = pending.token, "dropping stale guess result");
            return;
        }
        self.phase = Phase::Playing;
        self.timer.should_pause = false;

        let is_correct = match result {
            Ok(is_correct) => is_correct,
            Err(e) => {
                let message = e.to_string();
                self.session.last_error = Some(message.clone());
                self.emit(Event::VerificationFailed {
                    message,
                    at: self.now(),
                });
                return;
            }
        };

        let is_skip = pending.is_skip();
        let text = pending.text().to_string();
        self.session.last_error = None;
        self.session.guesses.push(UserGuess {
            text: text.clone(),
            is_correct,
            timestamp: self.now(),
            is_final_five_guess: false,
            is_hidden: is_skip,
        });
        self.emit(Event::GuessRecorded {
            text: text.clone(),
            is_correct,
            is_skip,
            wrong_guesses: self.session.displayed_wrong_guesses(),
            at: self.now(),
        });

        if is_correct {
            self.finish(Outcome::StandardWin, text);
            return;
        }

        let more_facts = self.session.has_unrevealed_facts();
        self.session.can_reveal_new_clue = more_facts;
        self.session.can_make_guess = !more_facts;

        if self.session.counted_wrong_guesses() >= self.timing.wrong_guess_threshold {
            self.transition_to_final_five(TransitionReason::Guesses);
        }
    }

    /// Submit a guess or a skip. Skips are resolved locally as incorrect.
    /// Entering Final Five through the threshold also starts its fetch.
    pub async fn submit_guess(&mut self, input: GuessInput) -> Result<(), Rejection> {
        let pending = self.begin_guess(input)?;
        let result = if pending.is_skip() {
            Ok(false)
        } else {
            let judge = Arc::clone(&self.judge);
            judge
                .verify_guess(pending.challenge_id(), pending.text())
                .await
        };
        self.complete_guess(pending, result);
        self.advance().await;
        Ok(())
    }

    fn transition_to_final_five(&mut self, reason: TransitionReason) {
        self.phase = Phase::FinalFiveTransition { reason };
        self.final_five.transition_reason = Some(reason);
        self.timer.is_active = false;
        self.session.can_make_guess = false;
        self.session.can_reveal_new_clue = false;
        tracing::debug!(?reason, "entering final five");
        self.emit(Event::FinalFiveTransition {
            reason,
            at: self.now(),
        });
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// One-second step of whichever countdown is running.
    pub fn tick(&mut self) {
        match self.phase {
            Phase::Playing => {
                if self.timer.tick() {
                    self.emit(Event::TimerExpired { at: self.now() });
                    self.transition_to_final_five(TransitionReason::Time);
                }
            }
            Phase::FinalFiveActive => {
                if !self.final_five.is_active || self.final_five.time_remaining == 0 {
                    return;
                }
                self.final_five.time_remaining -= 1;
                if self.final_five.time_remaining == 0 {
                    self.final_five.is_active = false;
                    self.emit(Event::FinalFiveTimedOut { at: self.now() });
                    self.phase = Phase::RevealingAnswer {
                        outcome: Outcome::LossFinalFiveTime,
                    };
                }
            }
            _ => {}
        }
    }

    /// Daily reset check, one tick, then any automatic follow-up.
    pub async fn on_tick(&mut self) {
        self.check_daily_reset();
        self.tick();
        self.advance().await;
    }

    /// Run the network step the current phase is waiting on, if any: the
    /// Final Five options fetch (unless the last attempt failed) or the
    /// answer lookup after a loss.
    pub async fn advance(&mut self) {
        let phase = self.phase;
        let outcome = match phase {
            Phase::FinalFiveTransition { .. }
                if self.final_five.error.is_none() && !self.final_five.is_fetching_options =>
            {
                self.enter_final_five().await
            }
            Phase::RevealingAnswer { .. } if self.answer_token.is_none() => {
                self.resolve_answer().await
            }
            _ => Ok(()),
        };
        if let Err(rejection) = outcome {
            tracing::debug!(%rejection, "automatic step skipped");
        }
    }

    // ── Final Five ───────────────────────────────────────────────────

    /// Discard any prefetched options, reset the Final Five timer and start
    /// a fetch with the full guess history.
    pub fn begin_final_five_fetch(&mut self) -> Result<PendingOptions, Rejection> {
        self.guard_finished()?;
        if !matches!(self.phase, Phase::FinalFiveTransition { .. }) {
            return Err(Rejection::NotPlaying);
        }
        if self.final_five.is_fetching_options {
            return Err(Rejection::FetchInFlight);
        }
        let challenge_id = self.challenge_id()?;

        self.session.final_five_options = None;
        self.final_five.time_remaining = self
            .timing
            .final_five_timer(self.game.user.hard_mode_enabled);
        self.final_five.error = None;
        self.final_five.is_fetching_options = true;

        let token = self.issue_token();
        self.options_token = Some(token);
        Ok(PendingOptions {
            generation: self.generation,
            token,
            challenge_id,
            previous_guesses: self.session.previous_guess_texts(),
        })
    }

    pub fn complete_final_five_fetch(
        &mut self,
        pending: PendingOptions,
        result: Result<Vec<String>, JudgeError>,
    ) {
        if pending.generation != self.generation || self.options_token != Some(pending.token) {
            tracing::debug!(token = pending.token, "dropping stale final five options");
            return;
        }
        self.options_token = None;
        self.final_five.is_fetching_options = false;

        let result = result.and_then(|options| {
            if options.len() < FINAL_FIVE_OPTIONS {
                Err(JudgeError::TooFewOptions { got: options.len() })
            } else {
                Ok(options)
            }
        });

        match result {
            Ok(options) => {
                self.session.final_five_options = Some(options.clone());
                self.final_five.is_active = true;
                self.phase = Phase::FinalFiveActive;
                self.emit(Event::FinalFiveStarted {
                    options,
                    time_remaining: self.final_five.time_remaining,
                    at: self.now(),
                });
            }
            Err(e) => {
                let message = e.to_string();
                self.final_five.error = Some(message.clone());
                self.emit(Event::FinalFiveError {
                    message,
                    at: self.now(),
                });
            }
        }
    }

    /// Fetch the Final Five options. Also the retry after a failed fetch.
    pub async fn enter_final_five(&mut self) -> Result<(), Rejection> {
        let pending = self.begin_final_five_fetch()?;
        let judge = Arc::clone(&self.judge);
        let result = judge
            .fetch_final_five_options(pending.challenge_id(), pending.previous_guesses())
            .await;
        self.complete_final_five_fetch(pending, result);
        Ok(())
    }

    /// Warm the options while still playing. Whatever is fetched here is
    /// discarded on entry to Final Five. Failures are ignored.
    pub async fn prefetch_final_five(&mut self) -> Result<(), Rejection> {
        self.guard_finished()?;
        if self.phase != Phase::Playing {
            return Err(Rejection::NotPlaying);
        }
        let challenge_id = self.challenge_id()?;
        let previous = self.session.previous_guess_texts();
        let judge = Arc::clone(&self.judge);

        match judge.fetch_final_five_options(&challenge_id, &previous).await {
            Ok(options) if self.phase == Phase::Playing => {
                self.session.final_five_options = Some(options);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "final five prefetch failed"),
        }
        Ok(())
    }

    /// Validate a selection and move into `AwaitingSelection`. The Final Five
    /// countdown holds while the selection is checked.
    pub fn begin_selection(&mut self, option: &str) -> Result<PendingSelection, Rejection> {
        self.guard_finished()?;
        match self.phase {
            Phase::FinalFiveActive => {}
            Phase::AwaitingSelection { .. } => return Err(Rejection::VerificationInFlight),
            _ => return Err(Rejection::NotPlaying),
        }
        let wanted = option.trim().to_lowercase();
        let option = self
            .session
            .final_five_options
            .as_ref()
            .and_then(|options| {
                options
                    .iter()
                    .find(|o| o.trim().to_lowercase() == wanted)
                    .cloned()
            })
            .ok_or(Rejection::UnknownOption)?;
        let challenge_id = self.challenge_id()?;

        let token = self.issue_token();
        self.phase = Phase::AwaitingSelection { token };
        Ok(PendingSelection {
            generation: self.generation,
            token,
            challenge_id,
            option,
        })
    }

    /// Apply a selection result. A wrong pick moves to `RevealingAnswer`; a
    /// failed check returns to `FinalFiveActive` with an error.
    pub fn complete_selection(
        &mut self,
        pending: PendingSelection,
        result: Result<bool, JudgeError>,
    ) {
        if pending.generation != self.generation
            || self.phase != (Phase::AwaitingSelection { token: pending.token })
        {
            tracing::debug!(token = pending.token, "dropping stale selection result");
            return;
        }

        let is_correct = match result {
            Ok(is_correct) => is_correct,
            Err(e) => {
                self.phase = Phase::FinalFiveActive;
                let message = e.to_string();
                self.final_five.error = Some(message.clone());
                self.emit(Event::FinalFiveError {
                    message,
                    at: self.now(),
                });
                return;
            }
        };

        self.final_five.error = None;
        self.final_five.is_active = false;
        self.session.guesses.push(UserGuess {
            text: pending.option.clone(),
            is_correct,
            timestamp: self.now(),
            is_final_five_guess: true,
            is_hidden: false,
        });
        self.emit(Event::OptionSelected {
            option: pending.option.clone(),
            is_correct,
            at: self.now(),
        });

        if is_correct {
            self.finish(Outcome::FinalFiveWin, pending.option);
        } else {
            self.phase = Phase::RevealingAnswer {
                outcome: Outcome::LossFinalFiveWrong,
            };
        }
    }

    /// Pick a Final Five option; a wrong pick resolves the answer right away.
    pub async fn select_option(&mut self, option: &str) -> Result<(), Rejection> {
        let pending = self.begin_selection(option)?;
        let judge = Arc::clone(&self.judge);
        let result = judge
            .verify_guess(pending.challenge_id(), pending.option())
            .await;
        self.complete_selection(pending, result);
        self.advance().await;
        Ok(())
    }

    // ── Answer reveal ────────────────────────────────────────────────

    pub fn begin_answer_reveal(&mut self) -> Result<PendingAnswer, Rejection> {
        let outcome = match self.phase {
            Phase::RevealingAnswer { outcome } => outcome,
            Phase::GameOver { .. } => return Err(Rejection::GameOver),
            _ => return Err(Rejection::NotPlaying),
        };
        if self.answer_token.is_some() {
            return Err(Rejection::FetchInFlight);
        }
        let challenge_id = self.challenge_id()?;
        let token = self.issue_token();
        self.answer_token = Some(token);
        Ok(PendingAnswer {
            generation: self.generation,
            token,
            challenge_id,
            outcome,
            known: self.session.known_correct_answer().map(str::to_string),
        })
    }

    /// End the game with the resolved answer, or a placeholder if the lookup
    /// failed. A failed lookup never keeps the game from ending.
    pub fn complete_answer_reveal(
        &mut self,
        pending: PendingAnswer,
        result: Result<String, JudgeError>,
    ) {
        if pending.generation != self.generation || self.answer_token != Some(pending.token) {
            tracing::debug!(token = pending.token, "dropping stale answer");
            return;
        }
        self.answer_token = None;

        let (answer, resolved) = match result {
            Ok(answer) => (answer, true),
            Err(_) => (UNKNOWN_ANSWER.to_string(), false),
        };
        self.emit(Event::AnswerRevealed {
            answer: answer.clone(),
            resolved,
            at: self.now(),
        });
        self.finish(pending.outcome, answer);
    }

    /// Resolve the correct answer: from the guess history if known,
    /// otherwise from the judge.
    pub async fn resolve_answer(&mut self) -> Result<(), Rejection> {
        let pending = self.begin_answer_reveal()?;
        let result = match pending.known_answer() {
            Some(known) => Ok(known.to_string()),
            None => {
                let judge = Arc::clone(&self.judge);
                judge.fetch_correct_answer(pending.challenge_id()).await
            }
        };
        self.complete_answer_reveal(pending, result);
        Ok(())
    }

    // ── Outcome ──────────────────────────────────────────────────────

    fn finish(&mut self, outcome: Outcome, correct_answer: String) {
        let today = self.day;
        if outcome.is_win() {
            StreakTracker::update_streak(&mut self.game.user, today);
        } else {
            StreakTracker::track_failed_attempt(&mut self.game.user, today);
        }

        let hard = self.game.user.hard_mode_enabled;
        let main_elapsed = self
            .timing
            .main_timer(hard)
            .saturating_sub(self.timer.time_remaining);
        let final_five_elapsed = if self.final_five.transition_reason.is_some() {
            self.timing
                .final_five_timer(hard)
                .saturating_sub(self.final_five.time_remaining)
        } else {
            0
        };

        self.game.today_game_data = Some(TodayGameData {
            outcome,
            correct_answer: correct_answer.clone(),
            number_of_tries: self.session.guesses.iter().filter(|g| !g.is_skip()).count(),
            time_spent: main_elapsed + final_five_elapsed,
            completion_date: today,
        });
        persist::save_game(&self.store, &self.game);

        self.session.is_game_over = true;
        self.session.outcome = Some(outcome);
        self.session.correct_answer = Some(correct_answer.clone());
        self.session.can_make_guess = false;
        self.session.can_reveal_new_clue = false;
        self.timer.is_active = false;
        self.final_five.is_active = false;
        self.phase = Phase::GameOver { outcome };

        tracing::info!(
            day = %today,
            ?outcome,
            streak = self.game.user.current_streak,
            "game over"
        );
        self.emit(Event::GameOver {
            outcome,
            correct_answer,
            current_streak: self.game.user.current_streak,
            at: self.now(),
        });
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Toggle hard mode. Timers that have not started yet pick up the new
    /// durations immediately.
    pub fn set_hard_mode(&mut self, enabled: bool) {
        self.game.user.hard_mode_enabled = enabled;
        if !self.timer.is_active && self.session.guesses.is_empty() && !self.phase.is_final_five()
        {
            self.timer = TimerState::new(self.timing.main_timer(enabled));
        }
        if !self.phase.is_final_five() && !self.phase.is_game_over() {
            self.final_five.time_remaining = self.timing.final_five_timer(enabled);
        }
        self.settings_changed();
    }

    pub fn set_autocomplete(&mut self, enabled: bool) {
        self.game.user.autocomplete_enabled = enabled;
        self.settings_changed();
    }

    fn settings_changed(&mut self) {
        persist::save_game(&self.store, &self.game);
        self.emit(Event::SettingsChanged {
            hard_mode: self.game.user.hard_mode_enabled,
            autocomplete: self.game.user.autocomplete_enabled,
            at: self.now(),
        });
    }
}
