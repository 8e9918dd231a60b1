use factday_core::StreakTracker;
use serde_json::json;

use super::{print_json, CliResult};

pub fn run() -> CliResult {
    let engine = super::open_engine()?;
    let today = engine.day();
    let user = engine.user();

    print_json(&json!({
        "today": today,
        "currentStreak": StreakTracker::effective_streak(user, today),
        "weeklyCompletions": user.weekly_completions,
        "lastCompletionDate": user.last_completion_date,
        "todayGameData": engine.today_game_data(),
    }))
}
