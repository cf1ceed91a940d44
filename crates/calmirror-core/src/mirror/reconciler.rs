//! One-way mirror reconciliation.
//!
//! A cycle fetches every configured source calendar over the sliding
//! window, creates or updates one mirror per live source event on the
//! target calendar, then removes mirrors whose source event was not seen.
//!
//! Writes to the mapping store happen one row at a time, right after the
//! remote call they record, so a crash loses at most the in-flight row.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::calendar::{CalendarService, MirroredEventDraft, SourceEvent};
use crate::error::{CalendarError, CoreError, Result};
use crate::storage::{Config, MappingStore, MirrorRecord, SourceSpec};

/// A source calendar with its id resolved for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub identifier: String,
    pub label: String,
    pub calendar_id: String,
}

/// Per-source fetch counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub label: String,
    pub calendar_id: String,
    pub fetched: usize,
    pub cancelled: usize,
}

/// A create or update that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFailure {
    pub source_calendar_id: String,
    pub source_event_id: String,
    pub summary: Option<String>,
    pub error: String,
}

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub dry_run: bool,
    pub sources: Vec<SourceReport>,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub failures: Vec<EventFailure>,
}

impl CycleReport {
    fn new(window_start: DateTime<Utc>, window_end: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            window_start,
            window_end,
            dry_run,
            sources: Vec::new(),
            created: 0,
            updated: 0,
            removed: 0,
            failures: Vec::new(),
        }
    }

    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs reconciliation cycles against a calendar service and mapping store.
pub struct Reconciler<'a, C, S> {
    calendar: &'a C,
    store: &'a S,
    config: &'a Config,
    dry_run: bool,
}

impl<'a, C: CalendarService, S: MappingStore> Reconciler<'a, C, S> {
    pub fn new(calendar: &'a C, store: &'a S, config: &'a Config) -> Self {
        Self {
            calendar,
            store,
            config,
            dry_run: false,
        }
    }

    /// Classify without writing: no remote writes, no row changes, no throttle.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one cycle using the current wall-clock time.
    pub fn reconcile_cycle(&self) -> Result<CycleReport> {
        self.reconcile_cycle_at(Utc::now())
    }

    /// Run one cycle with the window anchored at `now`.
    ///
    /// # Errors
    /// An out-of-range window, authentication failures, unresolved calendar
    /// names, failed source fetches and mapping store failures abort the
    /// cycle. Failed creates
    /// and updates do not; they are listed in the report.
    pub fn reconcile_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let (time_min, time_max) = self.config.window(now)?;
        let mut report = CycleReport::new(time_min, time_max, self.dry_run);

        let span = tracing::info_span!("cycle", id = %report.cycle_id, dry_run = self.dry_run);
        let _enter = span.enter();
        tracing::info!("sync cycle started");

        let sources = self.resolve_sources()?;
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for source in &sources {
            let events = self
                .calendar
                .list_events(&source.calendar_id, time_min, time_max)
                .map_err(|e| fetch_error(source, e))?;
            tracing::info!(
                source = %source.label,
                count = events.len(),
                "retrieved {} events from {}",
                events.len(),
                source.label
            );

            let mut source_report = SourceReport {
                label: source.label.clone(),
                calendar_id: source.calendar_id.clone(),
                fetched: events.len(),
                cancelled: 0,
            };

            for event in &events {
                if event.is_cancelled() {
                    source_report.cancelled += 1;
                    continue;
                }
                seen.insert((source.calendar_id.clone(), event.id.clone()));
                self.mirror_event(source, event, &mut report)?;
                self.throttle();
            }

            report.sources.push(source_report);
        }

        self.remove_stale(&seen, &mut report)?;

        tracing::info!(
            created = report.created,
            updated = report.updated,
            removed = report.removed,
            failed = report.failed(),
            "sync cycle complete"
        );
        Ok(report)
    }

    /// Resolve every configured source, in configured order.
    ///
    /// The calendar listing doubles as the credential check: a 401, or a 403
    /// that is not a quota refusal, is reported as
    /// [`CoreError::AuthenticationFailed`] before anything is fetched or
    /// written.
    pub fn resolve_sources(&self) -> Result<Vec<ResolvedSource>> {
        let directory = self.calendar.list_calendars().map_err(|e| {
            if e.is_auth() {
                CoreError::AuthenticationFailed(e.to_string())
            } else {
                CoreError::Calendar(e)
            }
        })?;

        self.config
            .sources()
            .into_iter()
            .map(|SourceSpec { identifier, label }| -> Result<ResolvedSource> {
                let calendar_id = directory.resolve(&identifier)?;
                Ok(ResolvedSource {
                    identifier,
                    label,
                    calendar_id,
                })
            })
            .collect()
    }

    /// Create or update the mirror of one live source event.
    ///
    /// Remote failures are logged and recorded; only store failures return
    /// an error.
    fn mirror_event(
        &self,
        source: &ResolvedSource,
        event: &SourceEvent,
        report: &mut CycleReport,
    ) -> Result<()> {
        let target_calendar_id = &self.config.target_calendar_id;
        let draft = MirroredEventDraft::from_source(&source.label, event);
        let existing = self.store.get(&source.calendar_id, &event.id)?;

        match existing {
            Some(target_event_id) => {
                if self.dry_run {
                    tracing::debug!(event_id = %event.id, "would update {}", draft.summary);
                    report.updated += 1;
                    return Ok(());
                }
                match self
                    .calendar
                    .update_event(target_calendar_id, &target_event_id, &draft)
                {
                    Ok(()) => report.updated += 1,
                    Err(e) => record_failure(report, source, event, &e),
                }
            }
            None => {
                if self.dry_run {
                    tracing::debug!(event_id = %event.id, "would create {}", draft.summary);
                    report.created += 1;
                    return Ok(());
                }
                match self.calendar.create_event(target_calendar_id, &draft) {
                    Ok(target_event_id) => {
                        // A crash between the create and this write leaves an
                        // unmapped mirror that the next cycle duplicates.
                        self.store.upsert(&MirrorRecord::new(
                            &source.calendar_id,
                            &event.id,
                            target_event_id,
                        ))?;
                        report.created += 1;
                    }
                    Err(e) => record_failure(report, source, event, &e),
                }
            }
        }
        Ok(())
    }

    /// Drop every mapped mirror whose source key was not seen this cycle.
    fn remove_stale(&self, seen: &HashSet<(String, String)>, report: &mut CycleReport) -> Result<()> {
        for record in self.store.all()? {
            if seen.contains(&record.key()) {
                continue;
            }
            if self.dry_run {
                tracing::debug!(target_event_id = %record.target_event_id, "would remove stale mirror");
                report.removed += 1;
                continue;
            }

            // The row goes regardless of the remote outcome.
            match self.delete_target_best_effort(&record.target_event_id) {
                Ok(()) => tracing::info!(
                    target_event_id = %record.target_event_id,
                    "removed deleted source event"
                ),
                Err(e) => tracing::debug!(
                    target_event_id = %record.target_event_id,
                    error = %e,
                    "ignoring failed delete of stale mirror"
                ),
            }
            self.store
                .delete(&record.source_calendar_id, &record.source_event_id)?;
            report.removed += 1;
        }
        Ok(())
    }

    /// Delete a mirror on the target calendar. Callers ignore the result:
    /// the target may already be gone, and the mapping row is removed
    /// either way.
    fn delete_target_best_effort(&self, target_event_id: &str) -> Result<(), CalendarError> {
        self.calendar
            .delete_event(&self.config.target_calendar_id, target_event_id)
    }

    fn throttle(&self) {
        let delay = self.config.throttle();
        if !self.dry_run && !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

fn fetch_error(source: &ResolvedSource, e: CalendarError) -> CoreError {
    tracing::error!(source = %source.label, error = %e, "failed to fetch source events");
    if e.is_auth() {
        CoreError::AuthenticationFailed(format!("{}: {e}", source.label))
    } else {
        CoreError::Calendar(e)
    }
}

fn record_failure(
    report: &mut CycleReport,
    source: &ResolvedSource,
    event: &SourceEvent,
    error: &CalendarError,
) {
    tracing::warn!(
        source = %source.label,
        event_id = %event.id,
        error = %error,
        "event sync failed ({})",
        event.summary.as_deref().unwrap_or("")
    );
    report.failures.push(EventFailure {
        source_calendar_id: source.calendar_id.clone(),
        source_event_id: event.id.clone(),
        summary: event.summary.clone(),
        error: error.to_string(),
    });
}
