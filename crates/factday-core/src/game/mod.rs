mod engine;
pub mod legacy;
mod model;
pub mod persist;
mod reset;
mod streak;

pub use engine::{
    PendingAnswer, PendingGuess, PendingOptions, PendingSelection, Phase, Rejection,
    SessionEngine, SessionSnapshot, SessionView,
};
pub use legacy::LegacyUserData;
pub use model::{
    CachedChallenge, Challenge, Fact, FinalFiveState, GuessInput, Outcome, PersistedGame,
    SessionState, TimerState, TodayGameData, TransitionReason, UserData, UserGuess,
    WeeklyCompletions, WeeklySlot, SKIP_GUESS, UNKNOWN_ANSWER,
};
pub use reset::{DailyResetManager, ResetPatch};
pub use streak::{StreakTracker, StreakUpdate};
