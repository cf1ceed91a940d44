//! Access check: can the principal read each configured source?

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calendar::CalendarService;
use crate::error::{CoreError, Result};
use crate::storage::SourceSpec;

/// Events sampled per source.
pub const SAMPLE_SIZE: usize = 2;

const UNTITLED: &str = "(No Title)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccessOutcome {
    Ok { upcoming: Vec<String> },
    Failed { reason: String },
}

/// Result of checking one source calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessReport {
    pub identifier: String,
    pub calendar_id: Option<String>,
    #[serde(flatten)]
    pub outcome: AccessOutcome,
}

impl AccessReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, AccessOutcome::Ok { .. })
    }
}

/// List up to [`SAMPLE_SIZE`] upcoming events from each source.
///
/// Only a rejected calendar listing is fatal; per-source problems (unknown
/// name, no access) are reported and the remaining sources still run.
pub fn verify_access<C: CalendarService>(
    calendar: &C,
    sources: &[SourceSpec],
    now: DateTime<Utc>,
) -> Result<Vec<AccessReport>> {
    tracing::info!(sources = sources.len(), "checking access to source calendars");
    let directory = calendar.list_calendars().map_err(|e| {
        if e.is_auth() {
            CoreError::AuthenticationFailed(e.to_string())
        } else {
            CoreError::Calendar(e)
        }
    })?;

    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        let calendar_id = match directory.resolve(&source.identifier) {
            Ok(id) => id,
            Err(e) => {
                reports.push(AccessReport {
                    identifier: source.identifier.clone(),
                    calendar_id: None,
                    outcome: AccessOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        let outcome = match calendar.list_upcoming(&calendar_id, now, SAMPLE_SIZE) {
            Ok(events) => AccessOutcome::Ok {
                upcoming: events
                    .into_iter()
                    .take(SAMPLE_SIZE)
                    .map(|ev| ev.summary.unwrap_or_else(|| UNTITLED.to_string()))
                    .collect(),
            },
            Err(e) => {
                tracing::warn!(source = %source.identifier, error = %e, "could not access source");
                AccessOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        reports.push(AccessReport {
            identifier: source.identifier.clone(),
            calendar_id: Some(calendar_id),
            outcome,
        });
    }

    Ok(reports)
}
