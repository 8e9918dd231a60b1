//! `factday config`: read and edit the TOML file under the config dir.
//!
//! Keys are dotted paths into the file's sections, so `retry.jitter_ms`
//! addresses `jitter_ms` in `[retry]`. Values are validated by the core
//! before anything is written back.

use clap::Subcommand;
use factday_core::{Config, ConfigError};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value by dotted key
    Get {
        /// Dotted key such as "game.timezone" or "api.base_url"
        key: String,
    },
    /// Validate and store one value
    Set {
        /// Dotted key
        key: String,
        /// Raw value, parsed according to the key's type
        value: String,
    },
    /// Dump every section as JSON
    Show,
    /// Overwrite the file with built-in defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!(key = %key, "config updated");
            println!("ok");
        }
        ConfigAction::Show => print_json(&Config::load()?)?,
        ConfigAction::Reset => {
            Config::default().save()?;
            tracing::info!("config reset");
            println!("defaults restored");
        }
    }
    Ok(())
}
