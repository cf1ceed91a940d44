mod config;
pub mod mapping_db;

pub use config::{Config, GoogleConfig, SourceSpec};
pub use mapping_db::{MappingDb, MappingStore, MirrorRecord};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/calmirror[-dev]/` based on CALMIRROR_ENV.
///
/// Set CALMIRROR_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CALMIRROR_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("calmirror-dev")
    } else {
        base_dir.join("calmirror")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
