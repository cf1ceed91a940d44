//! TOML-based mirror configuration.
//!
//! Holds everything a reconciliation run needs:
//! - Source calendar identifiers (display names or literal ids)
//! - The target calendar id
//! - The sliding window (`past_days` / `future_days`) and throttle delay
//! - Paths for the mapping database, log file, and cycle lock
//! - Google OAuth client settings
//!
//! Configuration is stored at `~/.config/calmirror/config.toml` unless a
//! path is given explicitly. It is loaded once per run and handed to the
//! reconciler; nothing reads it from global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Upper bound for `past_days` and `future_days` (about a century).
pub const MAX_WINDOW_DAYS: i64 = 36_500;
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: default_api_base(),
            token_url: default_token_url(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source_calendars: Vec<String>,
    #[serde(default)]
    pub target_calendar_id: String,
    #[serde(default = "default_past_days")]
    pub past_days: i64,
    #[serde(default = "default_future_days")]
    pub future_days: i64,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<PathBuf>,
    /// Optional label override per source identifier.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub google: GoogleConfig,
}

/// A configured source calendar and the label used in mirrored titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpec {
    pub identifier: String,
    pub label: String,
}

// Default value functions
fn default_past_days() -> i64 {
    30
}
fn default_future_days() -> i64 {
    45
}
fn default_throttle_ms() -> u64 {
    100
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_calendars: Vec::new(),
            target_calendar_id: String::new(),
            past_days: default_past_days(),
            future_days: default_future_days(),
            throttle_ms: default_throttle_ms(),
            database_path: None,
            log_file: None,
            lock_path: None,
            source_labels: BTreeMap::new(),
            google: GoogleConfig::default(),
        }
    }
}

impl Config {
    /// Default config location inside the data directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from `path`. A missing file is an error: there is no useful
    /// default for the calendars to mirror.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: if e.kind() == std::io::ErrorKind::NotFound {
                "file not found (run `calmirror config init`)".to_string()
            } else {
                e.to_string()
            },
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_err(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_err(e.to_string()))
    }

    /// Check the invariants a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_calendars.is_empty() {
            return Err(ConfigError::MissingKey("source_calendars".into()));
        }
        if let Some(blank) = self.source_calendars.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "source_calendars".into(),
                message: format!("blank identifier {blank:?}"),
            });
        }
        if self.target_calendar_id.trim().is_empty() {
            return Err(ConfigError::MissingKey("target_calendar_id".into()));
        }
        if !self.target_calendar_id.contains('@') {
            return Err(ConfigError::InvalidValue {
                key: "target_calendar_id".into(),
                message: "must be a literal calendar id".into(),
            });
        }
        if self
            .source_calendars
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&self.target_calendar_id))
        {
            return Err(ConfigError::InvalidValue {
                key: "target_calendar_id".into(),
                message: "target is also listed as a source".into(),
            });
        }
        for (key, days) in [("past_days", self.past_days), ("future_days", self.future_days)] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be between 0 and {MAX_WINDOW_DAYS}, got {days}"),
                });
            }
        }
        Ok(())
    }

    /// Sources in configured order, with their title labels.
    pub fn sources(&self) -> Vec<SourceSpec> {
        self.source_calendars
            .iter()
            .map(|identifier| SourceSpec {
                identifier: identifier.clone(),
                label: self.source_label(identifier).to_string(),
            })
            .collect()
    }

    /// Label for mirrored titles; the identifier itself unless overridden.
    pub fn source_label<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.source_labels
            .get(identifier)
            .map(String::as_str)
            .unwrap_or(identifier)
    }

    /// `[now - past_days, now + future_days]`.
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] if either bound falls outside the
    /// representable date range.
    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), ConfigError> {
        let out_of_range = |key: &str, days: i64| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("window of {days} days is out of range"),
        };
        let start = Duration::try_days(self.past_days)
            .and_then(|d| now.checked_sub_signed(d))
            .ok_or_else(|| out_of_range("past_days", self.past_days))?;
        let end = Duration::try_days(self.future_days)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| out_of_range("future_days", self.future_days))?;
        Ok((start, end))
    }

    pub fn throttle(&self) -> StdDuration {
        StdDuration::from_millis(self.throttle_ms)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("mirror_map.db")),
        }
    }

    pub fn lock_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.lock_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("calmirror.lock")),
        }
    }

    /// Get a scalar config value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "target_calendar_id" => Some(self.target_calendar_id.clone()),
            "past_days" => Some(self.past_days.to_string()),
            "future_days" => Some(self.future_days.to_string()),
            "throttle_ms" => Some(self.throttle_ms.to_string()),
            "source_calendars" => Some(self.source_calendars.join(",")),
            _ => None,
        }
    }

    /// Set a scalar config value by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        match key {
            "target_calendar_id" => self.target_calendar_id = value.to_string(),
            "past_days" => self.past_days = value.parse().map_err(|e| invalid(format!("{e}")))?,
            "future_days" => {
                self.future_days = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            "throttle_ms" => {
                self.throttle_ms = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            "source_calendars" => {
                self.source_calendars = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            _ => return Err(invalid("unknown key".into())),
        }
        Ok(())
    }

    /// Commented starting point written by `config init`.
    pub fn template() -> &'static str {
        indoc::indoc! {r#"
            # Calendars to mirror, by display name or literal id (anything with '@').
            source_calendars = [
                "someone@example.org",
                "Operations",
            ]

            # Literal id of the calendar that receives the mirrors.
            target_calendar_id = "c_replace_me@group.calendar.google.com"

            # Sliding window around now, in days.
            past_days = 30
            future_days = 45

            # Pause after each mirrored event, in milliseconds.
            throttle_ms = 100

            # database_path = "/opt/calmirror/mirror_map.db"
            # log_file = "/opt/calmirror/sync.log"
            # lock_path = "/opt/calmirror/calmirror.lock"

            # [source_labels]
            # "someone@example.org" = "SK"

            [google]
            # client_id = "..."
            # client_secret = "..."
        "#}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid() -> Config {
        Config {
            source_calendars: vec!["staff@example.org".into(), "Operations".into()],
            target_calendar_id: "c_target@group.calendar.google.com".into(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_apply_to_minimal_file() {
        let cfg = Config::parse(
            r#"
            source_calendars = ["a@example.org"]
            target_calendar_id = "t@group.calendar.google.com"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.past_days, 30);
        assert_eq!(cfg.future_days, 45);
        assert_eq!(cfg.throttle_ms, 100);
        assert_eq!(cfg.google.api_base, DEFAULT_API_BASE);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn template_parses() {
        let cfg = Config::parse(Config::template()).unwrap();
        assert_eq!(cfg.source_calendars.len(), 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_sources() {
        let cfg = Config {
            source_calendars: vec![],
            ..valid()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingKey(k)) if k == "source_calendars"));
    }

    #[test]
    fn validate_rejects_target_as_source() {
        let mut cfg = valid();
        cfg.source_calendars.push("C_TARGET@group.calendar.google.com".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn validate_rejects_target_name() {
        let cfg = Config {
            target_calendar_id: "Mirror".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_window() {
        let cfg = Config {
            past_days: -1,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_window() {
        let cfg = Config {
            future_days: 200_000_000,
            ..valid()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "future_days"
        ));

        let cfg = Config {
            past_days: MAX_WINDOW_DAYS,
            future_days: MAX_WINDOW_DAYS,
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn window_out_of_range_is_an_error() {
        let now = Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap();
        let huge_future = Config {
            future_days: 200_000_000,
            ..valid()
        };
        assert!(matches!(
            huge_future.window(now),
            Err(ConfigError::InvalidValue { key, .. }) if key == "future_days"
        ));

        let huge_past = Config {
            past_days: i64::MAX,
            ..valid()
        };
        assert!(matches!(
            huge_past.window(now),
            Err(ConfigError::InvalidValue { key, .. }) if key == "past_days"
        ));
    }

    #[test]
    fn labels_default_to_identifier() {
        let mut cfg = valid();
        cfg.source_labels.insert("Operations".into(), "OPS".into());
        let sources = cfg.sources();
        assert_eq!(sources[0].label, "staff@example.org");
        assert_eq!(sources[1].label, "OPS");
        assert_eq!(sources[1].identifier, "Operations");
    }

    #[test]
    fn window_spans_past_and_future() {
        let cfg = valid();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let (min, max) = cfg.window(now).unwrap();
        assert_eq!(min, Utc.with_ymd_and_hms(2024, 12, 11, 12, 0, 0).unwrap());
        assert_eq!(max, Utc.with_ymd_and_hms(2025, 2, 24, 12, 0, 0).unwrap());
    }

    #[test]
    fn get_and_set() {
        let mut cfg = valid();
        cfg.set("past_days", "7").unwrap();
        cfg.set("source_calendars", "a@example.org, Ops ,").unwrap();
        assert_eq!(cfg.get("past_days").as_deref(), Some("7"));
        assert_eq!(cfg.source_calendars, vec!["a@example.org", "Ops"]);
        assert!(cfg.set("throttle_ms", "fast").is_err());
        assert!(cfg.set("theme", "dark").is_err());
        assert!(cfg.get("theme").is_none());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = valid();
        cfg.source_labels.insert("Operations".into(), "OPS".into());
        cfg.database_path = Some(dir.path().join("map.db"));
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.source_calendars, cfg.source_calendars);
        assert_eq!(loaded.source_labels, cfg.source_labels);
        assert_eq!(loaded.database_path, cfg.database_path);
    }

    #[test]
    fn missing_file_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("config init"));
    }
}
