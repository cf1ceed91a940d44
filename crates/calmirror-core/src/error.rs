//! Core error types for calmirror-core.
//!
//! Fatal conditions (authentication, unresolved calendars, a concurrent
//! cycle, an unusable mapping store) surface as [`CoreError`]. Per-event
//! remote failures are [`CalendarError`] values that the reconciler logs
//! and absorbs.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for calmirror-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Mapping store errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth / credential errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Calendar service errors that abort the cycle (e.g. a failed fetch)
    #[error("Calendar service error: {0}")]
    Calendar(#[from] CalendarError),

    /// A configured calendar name is not visible to the principal
    #[error("Calendar not found: {identifier}")]
    CalendarNotFound { identifier: String },

    /// Credentials were missing or rejected by the calendar service
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Another process holds the cycle lock
    #[error("A sync cycle is already running (lock held on {})", lock_path.display())]
    CycleAlreadyRunning { lock_path: PathBuf },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mapping store errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Directory for the database file could not be created
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema creation failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Home / data directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Callback timeout
    #[error("OAuth callback timeout: no callback received within {timeout_secs} seconds")]
    CallbackTimeout { timeout_secs: u64 },

    /// Access token expired
    #[error("Access token expired and no refresh token available")]
    TokenExpired,

    /// Not authenticated
    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    /// Credentials not configured
    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// OS keyring failure
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Calendar service errors.
#[derive(Error, Debug)]
pub enum CalendarError {
    /// Remote rejected the request
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response lacked a required field
    #[error("Missing field '{0}' in response")]
    MissingField(&'static str),

    /// Bad API base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The blocking runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl CalendarError {
    /// 404 / 410: the resource does not exist (or no longer exists).
    pub fn is_not_found(&self) -> bool {
        matches!(self, CalendarError::Http { status: 404 | 410, .. })
    }

    /// 401, or a 403 that is not a quota refusal: credentials missing,
    /// expired, or lacking delegation.
    pub fn is_auth(&self) -> bool {
        match self {
            CalendarError::Http { status: 401, .. } => true,
            CalendarError::Http { status: 403, .. } => !self.is_rate_limited(),
            _ => false,
        }
    }

    /// 429, or a 403 whose message is one of Google's rate or usage limits.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            CalendarError::Http { status: 429, .. } => true,
            CalendarError::Http { status: 403, message } => {
                let message = message.to_lowercase();
                ["rate limit", "usage limit", "quota"]
                    .iter()
                    .any(|needle| message.contains(needle))
            }
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for OAuthError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        OAuthError::CallbackTimeout { timeout_secs: 300 }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
