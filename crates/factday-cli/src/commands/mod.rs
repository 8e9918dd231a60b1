pub mod config;
pub mod play;
pub mod settings;
pub mod stats;

use std::sync::Arc;

use factday_core::judge::ensure_session_id;
use factday_core::{Config, DurableStore, HttpJudge, SessionEngine, SqliteBackend, SystemClock};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the on-disk store and bootstrap an engine against the configured judge.
pub fn open_engine() -> Result<SessionEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = DurableStore::new(SqliteBackend::open()?);
    let session_id = ensure_session_id(&store);
    let judge = HttpJudge::new(&config.api, &config.retry, session_id)?;
    let mut engine = SessionEngine::new(Arc::new(judge), store, Arc::new(SystemClock), &config)?;
    engine.bootstrap();
    tracing::debug!(day = %engine.day(), phase = ?engine.phase(), "engine ready");
    Ok(engine)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print pending engine events, one compact JSON object per line.
pub fn print_events(engine: &mut SessionEngine) -> CliResult {
    for event in engine.take_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
