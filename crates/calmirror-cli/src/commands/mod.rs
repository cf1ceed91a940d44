pub mod auth;
pub mod calendars;
pub mod config;
pub mod mappings;
pub mod sync;
pub mod verify;

use std::path::{Path, PathBuf};

use calmirror_core::auth::TokenSource;
use calmirror_core::{Config, CoreError, GoogleCalendarClient};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// The `--config` path, or the default location.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, CoreError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::default_path()?),
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config, CoreError> {
    Ok(Config::load_from(&config_path(explicit)?)?)
}

/// Load and validate; commands that talk to Google need a usable config.
pub fn load_valid_config(explicit: Option<&Path>) -> Result<Config, CoreError> {
    let config = load_config(explicit)?;
    config.validate()?;
    Ok(config)
}

/// Google client authenticated from the environment or the keyring.
pub fn google_client(config: &Config) -> Result<GoogleCalendarClient, CoreError> {
    let source = TokenSource::from_env(&config.google);
    let token = source
        .access_token()
        .map_err(|e| CoreError::AuthenticationFailed(format!("{} ({e})", source.describe())))?;
    Ok(GoogleCalendarClient::new(&config.google.api_base, token)?)
}
