//! `calmirror sync`: one reconciliation cycle.
//!
//! Intended to be run on a schedule. A second invocation while a cycle is
//! still running exits with an error instead of racing the first.

use std::path::Path;

use calmirror_core::logging::init_tracing;
use calmirror_core::{Config, CycleLock, CycleReport, MappingDb, Reconciler};

use super::{google_client, load_valid_config, CmdResult};

pub fn run(config_path: Option<&Path>, dry_run: bool, json: bool) -> CmdResult {
    let config = load_valid_config(config_path)?;
    init_tracing(config.log_file.as_deref())?;

    let mut lock = CycleLock::open(&config.lock_path()?)?;
    let _guard = lock.try_acquire()?;

    match run_cycle(&config, dry_run) {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "sync cycle failed");
            Err(e.into())
        }
    }
}

fn run_cycle(config: &Config, dry_run: bool) -> calmirror_core::Result<CycleReport> {
    let client = google_client(config)?;
    let store = MappingDb::open(&config.database_path()?)?;
    Reconciler::new(&client, &store, config)
        .dry_run(dry_run)
        .reconcile_cycle()
}

fn print_report(report: &CycleReport) {
    if report.dry_run {
        println!("Dry run: no changes were written.");
    }
    println!(
        "Window {} .. {}",
        report.window_start.format("%Y-%m-%d %H:%M"),
        report.window_end.format("%Y-%m-%d %H:%M")
    );
    for source in &report.sources {
        println!(
            "  {:<24} {} events ({} cancelled)",
            source.label, source.fetched, source.cancelled
        );
    }
    println!(
        "created {}, updated {}, removed {}, failed {}",
        report.created,
        report.updated,
        report.removed,
        report.failed()
    );
    for failure in &report.failures {
        println!(
            "  failed: {} {} ({}): {}",
            failure.source_calendar_id,
            failure.source_event_id,
            failure.summary.as_deref().unwrap_or(""),
            failure.error
        );
    }
}
