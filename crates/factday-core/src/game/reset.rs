//! Daily reset.
//!
//! ```text
//! Stale --(stored day != today, or finished game from another day)--> Current
//! Current --(same day)--> Current   (no-op)
//! ```
//!
//! The check returns `Option<ResetPatch>`: `None` means no action was taken
//! and the caller must leave its state untouched. A patch carries fresh
//! session state with the user's durable data laid over it, and is applied
//! by wholesale replacement.

use serde::{Deserialize, Serialize};

use super::model::{FinalFiveState, PersistedGame, SessionState, TimerState, UserData};
use super::persist;
use crate::clock::{ChallengeCalendar, ChallengeDay, Clock};
use crate::storage::{DurableStore, GameConfig};

/// Replacement state produced by a daily reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetPatch {
    pub day: ChallengeDay,
    pub user: UserData,
    pub session: SessionState,
    pub timer: TimerState,
    pub final_five: FinalFiveState,
}

impl ResetPatch {
    /// Fresh defaults with `user` preserved.
    pub fn fresh(day: ChallengeDay, user: UserData, timing: &GameConfig) -> Self {
        let hard = user.hard_mode_enabled;
        Self {
            day,
            session: SessionState::new(),
            timer: TimerState::new(timing.main_timer(hard)),
            final_five: FinalFiveState::new(timing.final_five_timer(hard)),
            user,
        }
    }

    /// Durable part of the patch: user data kept, day-scoped fields cleared.
    pub fn persisted(&self) -> PersistedGame {
        PersistedGame {
            user: self.user.clone(),
            today_game_data: None,
            today_challenge: None,
        }
    }
}

/// Decides whether a new challenge day has begun.
#[derive(Debug, Clone)]
pub struct DailyResetManager {
    calendar: ChallengeCalendar,
    /// Day of the last check that ran, so repeated calls within a day are no-ops.
    checked_day: Option<ChallengeDay>,
}

impl DailyResetManager {
    pub fn new(calendar: ChallengeCalendar) -> Self {
        Self {
            calendar,
            checked_day: None,
        }
    }

    pub fn calendar(&self) -> &ChallengeCalendar {
        &self.calendar
    }

    /// Whether `game` is stale relative to `today`.
    pub fn is_stale(store: &DurableStore, game: &PersistedGame, today: ChallengeDay) -> bool {
        let stored_day = persist::recorded_day(store);
        let finished_other_day = game
            .today_game_data
            .as_ref()
            .is_some_and(|d| d.completion_date != today);
        stored_day != Some(today) || finished_other_day
    }

    /// Run the reset check.
    ///
    /// On a stale day the new day is recorded in `store` before returning, so
    /// the next call sees `Current`. Only the first call per day does any work.
    pub fn check(
        &mut self,
        store: &DurableStore,
        clock: &dyn Clock,
        game: &PersistedGame,
        timing: &GameConfig,
    ) -> Option<ResetPatch> {
        let today = self.calendar.current_day(clock);
        if self.checked_day == Some(today) {
            return None;
        }
        self.checked_day = Some(today);

        if !Self::is_stale(store, game, today) {
            return None;
        }

        let patch = ResetPatch::fresh(today, game.user.clone(), timing);
        persist::record_day(store, today);
        tracing::info!(
            day = %today,
            streak = patch.user.current_streak,
            "daily reset"
        );
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::game::model::{Outcome, TodayGameData, WeeklySlot};
    use chrono::{TimeZone, Utc};

    fn noon(y: i32, m: u32, d: u32) -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(y, m, d, 16, 0, 0).unwrap())
    }

    fn day(s: &str) -> ChallengeDay {
        s.parse().unwrap()
    }

    fn played_game(on: &str) -> PersistedGame {
        PersistedGame {
            user: UserData {
                current_streak: 5,
                last_completion_date: Some(day(on)),
                hard_mode_enabled: true,
                ..UserData::default()
            },
            today_game_data: Some(TodayGameData {
                outcome: Outcome::StandardWin,
                correct_answer: "Tiger".into(),
                number_of_tries: 2,
                time_spent: 80,
                completion_date: day(on),
            }),
            today_challenge: None,
        }
    }

    #[test]
    fn new_day_resets_and_preserves_user_data() {
        let store = DurableStore::in_memory();
        persist::record_day(&store, day("2025-09-22"));
        let game = played_game("2025-09-22");
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());

        let patch = manager
            .check(&store, &noon(2025, 9, 23), &game, &GameConfig::default())
            .expect("reset should fire");

        assert_eq!(patch.day, day("2025-09-23"));
        assert_eq!(patch.user, game.user);
        assert_eq!(patch.session, SessionState::new());
        assert_eq!(patch.timer, TimerState::new(60));
        assert!(patch.persisted().today_game_data.is_none());
        assert_eq!(persist::recorded_day(&store), Some(day("2025-09-23")));
    }

    #[test]
    fn same_day_is_noop() {
        let store = DurableStore::in_memory();
        persist::record_day(&store, day("2025-09-23"));
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        let patch = manager.check(
            &store,
            &noon(2025, 9, 23),
            &PersistedGame::default(),
            &GameConfig::default(),
        );
        assert!(patch.is_none());
    }

    #[test]
    fn stale_completion_forces_reset_even_if_day_recorded() {
        let store = DurableStore::in_memory();
        persist::record_day(&store, day("2025-09-23"));
        let game = played_game("2025-09-22");
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        assert!(manager
            .check(&store, &noon(2025, 9, 23), &game, &GameConfig::default())
            .is_some());
    }

    #[test]
    fn completion_today_is_current() {
        let store = DurableStore::in_memory();
        persist::record_day(&store, day("2025-09-23"));
        let game = played_game("2025-09-23");
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        assert!(manager
            .check(&store, &noon(2025, 9, 23), &game, &GameConfig::default())
            .is_none());
    }

    #[test]
    fn second_call_same_day_is_noop_even_before_apply() {
        let store = DurableStore::in_memory();
        let game = played_game("2025-09-20");
        let clock = noon(2025, 9, 23);
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        assert!(manager.check(&store, &clock, &game, &GameConfig::default()).is_some());
        assert!(manager.check(&store, &clock, &game, &GameConfig::default()).is_none());
    }

    #[test]
    fn fresh_manager_sees_recorded_day() {
        let store = DurableStore::in_memory();
        let clock = noon(2025, 9, 23);
        let mut first = DailyResetManager::new(ChallengeCalendar::default());
        let patch = first
            .check(&store, &clock, &PersistedGame::default(), &GameConfig::default())
            .unwrap();
        let mut second = DailyResetManager::new(ChallengeCalendar::default());
        assert!(second
            .check(&store, &clock, &patch.persisted(), &GameConfig::default())
            .is_none());
    }

    #[test]
    fn first_ever_run_defaults_user_fields() {
        let store = DurableStore::in_memory();
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        let patch = manager
            .check(
                &store,
                &noon(2025, 9, 23),
                &PersistedGame::default(),
                &GameConfig::default(),
            )
            .unwrap();
        assert_eq!(patch.user.current_streak, 0);
        assert_eq!(patch.user.weekly_completions, [None::<WeeklySlot>; 7]);
        assert!(patch.user.last_completion_date.is_none());
        assert!(!patch.user.hard_mode_enabled);
        assert!(!patch.user.autocomplete_enabled);
        assert_eq!(patch.timer.time_remaining, 300);
    }

    #[test]
    fn crossing_midnight_in_reference_zone_triggers_next_check() {
        let store = DurableStore::in_memory();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 9, 23, 3, 59, 0).unwrap());
        let mut manager = DailyResetManager::new(ChallengeCalendar::default());
        let patch = manager
            .check(&store, &clock, &PersistedGame::default(), &GameConfig::default())
            .unwrap();
        assert_eq!(patch.day, day("2025-09-22"));

        clock.advance(chrono::Duration::minutes(2));
        let patch = manager
            .check(&store, &clock, &patch.persisted(), &GameConfig::default())
            .unwrap();
        assert_eq!(patch.day, day("2025-09-23"));
    }
}
