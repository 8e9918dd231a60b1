//! One-shot import of the pre-versioned storage layout.
//!
//! Older clients kept streak, game and timer state under three ad-hoc keys.
//! If any of them is present the streak fields are salvaged on a best-effort
//! basis, all three keys are deleted, and the salvaged data is handed back
//! for the caller to merge.

use serde_json::Value;

use super::model::{UserData, WeeklyCompletions};
use crate::clock::ChallengeDay;
use crate::storage::keys;
use crate::storage::DurableStore;

/// Fields recovered from legacy keys. `None` means "not present or unreadable".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyUserData {
    pub current_streak: Option<u32>,
    pub weekly_completions: Option<WeeklyCompletions>,
    pub last_completion_date: Option<ChallengeDay>,
    pub hard_mode_enabled: Option<bool>,
}

impl LegacyUserData {
    /// Overlay recovered fields onto `user`.
    pub fn merge_into(&self, user: &mut UserData) {
        if let Some(streak) = self.current_streak {
            user.current_streak = streak;
        }
        if let Some(weekly) = self.weekly_completions {
            user.weekly_completions = weekly;
            user.weekly_anchor = self.last_completion_date.map(|d| d.week_start());
        }
        if let Some(date) = self.last_completion_date {
            user.last_completion_date = Some(date);
        }
        if let Some(hard) = self.hard_mode_enabled {
            user.hard_mode_enabled = hard;
        }
    }
}

pub fn has_legacy_streak_data(store: &DurableStore) -> bool {
    store.contains(keys::LEGACY_STREAK)
}

pub fn has_legacy_game_state(store: &DurableStore) -> bool {
    store.contains(keys::LEGACY_GAME_STATE) || store.contains(keys::LEGACY_TIMER)
}

/// Extract and remove legacy data. Returns `None` when there is nothing to
/// migrate, so repeated calls after the first are no-ops.
pub fn migrate_legacy(store: &DurableStore) -> Option<LegacyUserData> {
    if !has_legacy_streak_data(store) && !has_legacy_game_state(store) {
        return None;
    }

    let mut data = LegacyUserData::default();

    if let Some(streak) = store.get_opt::<Value>(keys::LEGACY_STREAK) {
        let streak = unwrap_state(streak);
        data.current_streak = streak
            .get("currentStreak")
            .or_else(|| streak.get("streak"))
            .and_then(Value::as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32);
        data.last_completion_date = streak
            .get("lastCompletionDate")
            .and_then(Value::as_str)
            .and_then(|s| s.get(..10))
            .and_then(|s| s.parse().ok());
        data.weekly_completions = streak.get("weeklyCompletions").and_then(parse_weekly);
    }

    if let Some(game) = store.get_opt::<Value>(keys::LEGACY_GAME_STATE) {
        let game = unwrap_state(game);
        data.hard_mode_enabled = game.get("isHardModeEnabled").and_then(Value::as_bool);
    }

    store.remove(keys::LEGACY_STREAK);
    store.remove(keys::LEGACY_GAME_STATE);
    store.remove(keys::LEGACY_TIMER);

    tracing::info!(
        streak = ?data.current_streak,
        last_completion = ?data.last_completion_date,
        "migrated legacy storage"
    );
    Some(data)
}

/// Legacy blobs were sometimes wrapped as `{ "state": { .. } }`.
fn unwrap_state(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("state").is_some_and(Value::is_object) => {
            map.remove("state").unwrap_or_default()
        }
        other => other,
    }
}

fn parse_weekly(value: &Value) -> Option<WeeklyCompletions> {
    let items = value.as_array()?;
    let mut weekly: WeeklyCompletions = Default::default();
    for (slot, item) in weekly.iter_mut().zip(items) {
        *slot = match item {
            Value::Bool(true) => Some(super::model::WeeklySlot::Completed),
            Value::String(s) => serde_json::from_value(Value::String(s.clone())).ok(),
            _ => None,
        };
    }
    Some(weekly)
}
