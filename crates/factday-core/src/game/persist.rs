//! Load and save of the versioned `game-store` blob and the recorded day.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::PersistedGame;
use crate::clock::ChallengeDay;
use crate::storage::keys;
use crate::storage::migrations::{migrate_game_store, GAME_STORE_VERSION};
use crate::storage::DurableStore;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    state: Value,
}

/// Read the game blob, upgrading older versions. Missing or corrupt data
/// yields the defaults.
pub fn load_game(store: &DurableStore) -> PersistedGame {
    let Some(envelope) = store.get_opt::<Envelope>(keys::GAME_STORE) else {
        return PersistedGame::default();
    };

    let migrated = migrate_game_store(envelope.state, envelope.version);
    match serde_json::from_value(migrated) {
        Ok(game) => {
            if envelope.version < GAME_STORE_VERSION {
                tracing::info!(
                    from = envelope.version,
                    to = GAME_STORE_VERSION,
                    "migrated stored game data"
                );
                save_game(store, &game);
            }
            game
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored game data unreadable, using defaults");
            PersistedGame::default()
        }
    }
}

pub fn save_game(store: &DurableStore, game: &PersistedGame) {
    let state = match serde_json::to_value(game) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize game data");
            return;
        }
    };
    store.set(
        keys::GAME_STORE,
        &Envelope {
            version: GAME_STORE_VERSION,
            state,
        },
    );
}

pub fn recorded_day(store: &DurableStore) -> Option<ChallengeDay> {
    store.get_opt(keys::CHALLENGE_DAY)
}

pub fn record_day(store: &DurableStore, day: ChallengeDay) {
    store.set(keys::CHALLENGE_DAY, &day);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::WeeklySlot;
    use crate::storage::MemoryBackend;
    use serde_json::json;

    #[test]
    fn empty_store_loads_defaults() {
        let store = DurableStore::in_memory();
        assert_eq!(load_game(&store), PersistedGame::default());
        assert!(recorded_day(&store).is_none());
    }

    #[test]
    fn save_then_load() {
        let store = DurableStore::in_memory();
        let mut game = PersistedGame::default();
        game.user.current_streak = 12;
        game.user.autocomplete_enabled = true;
        save_game(&store, &game);
        assert_eq!(load_game(&store), game);
    }

    #[test]
    fn version_one_blob_is_upgraded_and_rewritten() {
        let backend = MemoryBackend::new();
        backend.insert_raw(
            keys::GAME_STORE,
            &json!({
                "version": 1,
                "state": {
                    "currentStreak": 2,
                    "weeklyCompletions": [false, true, false, false, false, false, false],
                    "lastCompletionDate": "2025-09-22",
                    "isHardModeEnabled": true
                }
            })
            .to_string(),
        );
        let store = DurableStore::new(backend.clone());
        let game = load_game(&store);
        assert_eq!(game.user.current_streak, 2);
        assert!(game.user.hard_mode_enabled);
        assert_eq!(game.user.weekly_completions[1], Some(WeeklySlot::Completed));

        let raw: Value = serde_json::from_str(&backend.raw(keys::GAME_STORE).unwrap()).unwrap();
        assert_eq!(raw["version"], json!(GAME_STORE_VERSION));
    }

    #[test]
    fn corrupt_blob_falls_back_to_defaults() {
        let backend = MemoryBackend::new();
        backend.insert_raw(keys::GAME_STORE, r#"{"version": 2, "state": {"currentStreak": "lots"}}"#);
        let store = DurableStore::new(backend);
        assert_eq!(load_game(&store), PersistedGame::default());
    }

    #[test]
    fn recorded_day_round_trip() {
        let store = DurableStore::in_memory();
        let day: ChallengeDay = "2025-09-22".parse().unwrap();
        record_day(&store, day);
        assert_eq!(recorded_day(&store), Some(day));
    }
}
