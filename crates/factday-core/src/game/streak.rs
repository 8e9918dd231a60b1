//! Daily streak and weekly completion tracking.
//!
//! Only winning outcomes move the streak. A loss marks the weekday slot as
//! failed and leaves the streak alone; the break shows up the next time a win
//! is evaluated and the previous completion is not yesterday.

use serde::{Deserialize, Serialize};

use super::model::{UserData, WeeklySlot};
use crate::clock::ChallengeDay;

/// Result of applying a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub streak_before: u32,
    pub streak_after: u32,
    /// False when the win started a new streak.
    pub continued: bool,
}

/// Applies terminal outcomes to [`UserData`].
pub struct StreakTracker;

impl StreakTracker {
    /// Record a win on `today`.
    ///
    /// Continues the streak when the last completion was exactly yesterday,
    /// otherwise restarts it at 1.
    pub fn update_streak(user: &mut UserData, today: ChallengeDay) -> StreakUpdate {
        let streak_before = user.current_streak;
        let continued = user.last_completion_date == Some(today.day_before());

        user.current_streak = if continued {
            streak_before.saturating_add(1)
        } else {
            1
        };
        Self::mark_weekday(user, today, WeeklySlot::Completed);
        user.last_completion_date = Some(today);

        StreakUpdate {
            streak_before,
            streak_after: user.current_streak,
            continued,
        }
    }

    /// Record a Final Five loss on `today`.
    pub fn track_failed_attempt(user: &mut UserData, today: ChallengeDay) {
        Self::mark_weekday(user, today, WeeklySlot::Failed);
    }

    /// Streak as it should be displayed on `today`: a streak whose last win
    /// is older than yesterday has already lapsed.
    pub fn effective_streak(user: &UserData, today: ChallengeDay) -> u32 {
        match user.last_completion_date {
            Some(last) if last == today || last == today.day_before() => user.current_streak,
            _ => 0,
        }
    }

    fn mark_weekday(user: &mut UserData, today: ChallengeDay, slot: WeeklySlot) {
        let week = today.week_start();
        if user.weekly_anchor != Some(week) {
            user.weekly_completions = Default::default();
            user.weekly_anchor = Some(week);
        }
        user.weekly_completions[today.weekday_index()] = Some(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(s: &str) -> ChallengeDay {
        s.parse().unwrap()
    }

    #[test]
    fn first_win_starts_at_one() {
        let mut user = UserData::default();
        let update = StreakTracker::update_streak(&mut user, day("2025-09-23"));
        assert_eq!(update.streak_after, 1);
        assert!(!update.continued);
        assert_eq!(user.last_completion_date, Some(day("2025-09-23")));
        // Tuesday
        assert_eq!(user.weekly_completions[2], Some(WeeklySlot::Completed));
    }

    #[test]
    fn win_after_yesterday_continues() {
        let mut user = UserData {
            current_streak: 4,
            last_completion_date: Some(day("2025-09-22")),
            ..UserData::default()
        };
        StreakTracker::update_streak(&mut user, day("2025-09-23"));
        assert_eq!(user.current_streak, 5);
    }

    #[test]
    fn gap_resets_to_one() {
        let mut user = UserData {
            current_streak: 9,
            last_completion_date: Some(day("2025-09-20")),
            ..UserData::default()
        };
        StreakTracker::update_streak(&mut user, day("2025-09-23"));
        assert_eq!(user.current_streak, 1);
    }

    #[test]
    fn failure_marks_slot_only() {
        let mut user = UserData {
            current_streak: 3,
            last_completion_date: Some(day("2025-09-22")),
            ..UserData::default()
        };
        StreakTracker::track_failed_attempt(&mut user, day("2025-09-23"));
        assert_eq!(user.current_streak, 3);
        assert_eq!(user.last_completion_date, Some(day("2025-09-22")));
        assert_eq!(user.weekly_completions[2], Some(WeeklySlot::Failed));
    }

    #[test]
    fn new_week_clears_slots() {
        let mut user = UserData::default();
        StreakTracker::update_streak(&mut user, day("2025-09-26")); // Friday
        StreakTracker::update_streak(&mut user, day("2025-09-27")); // Saturday
        StreakTracker::update_streak(&mut user, day("2025-09-28")); // Sunday, new week
        assert_eq!(user.current_streak, 3);
        assert_eq!(user.weekly_completions[0], Some(WeeklySlot::Completed));
        assert_eq!(user.weekly_completions[5], None);
        assert_eq!(user.weekly_completions[6], None);
        assert_eq!(user.weekly_anchor, Some(day("2025-09-28")));
    }

    #[test]
    fn effective_streak_lapses_after_gap() {
        let user = UserData {
            current_streak: 6,
            last_completion_date: Some(day("2025-09-20")),
            ..UserData::default()
        };
        assert_eq!(StreakTracker::effective_streak(&user, day("2025-09-21")), 6);
        assert_eq!(StreakTracker::effective_streak(&user, day("2025-09-23")), 0);
    }

    proptest! {
        #[test]
        fn win_increments_exactly_when_last_was_yesterday(
            streak in 0u32..10_000,
            offset in -30i64..30,
        ) {
            let today = day("2025-09-23");
            let last = ChallengeDay::new(today.date() + chrono::Duration::days(offset));
            let mut user = UserData {
                current_streak: streak,
                last_completion_date: Some(last),
                ..UserData::default()
            };
            StreakTracker::update_streak(&mut user, today);
            if offset == -1 {
                prop_assert_eq!(user.current_streak, streak + 1);
            } else {
                prop_assert_eq!(user.current_streak, 1);
            }
        }
    }
}
