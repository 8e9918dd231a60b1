use clap::{Subcommand, ValueEnum};

use super::{print_events, print_json, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        matches!(toggle, Toggle::On)
    }
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Shorter timers for both phases
    HardMode { state: Toggle },
    /// Suggest answers while typing
    Autocomplete { state: Toggle },
    /// Print current preferences
    Show,
}

pub fn run(action: SettingsAction) -> CliResult {
    let mut engine = super::open_engine()?;

    match action {
        SettingsAction::HardMode { state } => engine.set_hard_mode(state.into()),
        SettingsAction::Autocomplete { state } => engine.set_autocomplete(state.into()),
        SettingsAction::Show => {}
    }

    print_events(&mut engine)?;
    let user = engine.user();
    print_json(&serde_json::json!({
        "isHardModeEnabled": user.hard_mode_enabled,
        "isAutocompleteEnabled": user.autocomplete_enabled,
    }))?;
    engine.save_snapshot();
    Ok(())
}
