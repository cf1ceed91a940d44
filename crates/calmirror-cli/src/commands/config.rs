use std::path::Path;

use calmirror_core::Config;
use clap::Subcommand;

use super::{config_path, load_config, CmdResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented config file to edit
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
    /// Print the effective config as JSON
    Show,
    /// Check the config without contacting Google
    Check,
    /// Get a config value
    Get {
        /// Config key (e.g. "past_days", "target_calendar_id")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value (comma-separated for source_calendars)
        value: String,
    },
}

pub fn run(explicit: Option<&Path>, action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Init { force } => {
            let path = config_path(explicit)?;
            if path.exists() && !force {
                return Err(format!("{} already exists (use --force)", path.display()).into());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::template())?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Path => println!("{}", config_path(explicit)?.display()),
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Check => {
            let config = load_config(explicit)?;
            config.validate()?;
            println!("ok");
        }
        ConfigAction::Get { key } => {
            let config = load_config(explicit)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path(explicit)?;
            let mut config = Config::load_from(&path)?;
            config.set(&key, &value)?;
            config.save_to(&path)?;
            println!("ok");
        }
    }
    Ok(())
}
