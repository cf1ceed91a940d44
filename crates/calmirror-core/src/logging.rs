//! Tracing initialization.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable with per-target log levels.
pub const LOG_ENV: &str = "CALMIRROR_LOG";

const DEFAULT_FILTER: &str = "calmirror=info";

/// Initialize logging.
///
/// Reads `CALMIRROR_LOG` for levels (e.g. `calmirror=debug`), falling back
/// to `calmirror=info`. With `log_file`, lines are appended to that file
/// without colours; otherwise they go to stderr.
///
/// Only the first call installs a subscriber.
pub fn init_tracing(log_file: Option<&Path>) -> std::io::Result<()> {
    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };

    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match file {
            Some(file) => registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init(),
            None => registry
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .try_init(),
        };
        if installed.is_err() {
            eprintln!("calmirror: a global tracing subscriber was already set");
        }
    });
    Ok(())
}
