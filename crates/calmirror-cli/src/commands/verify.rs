use std::path::Path;

use calmirror_core::logging::init_tracing;
use calmirror_core::mirror::AccessOutcome;
use calmirror_core::verify_access;

use super::{google_client, load_valid_config, CmdResult};

pub fn run(config_path: Option<&Path>, json: bool) -> CmdResult {
    let config = load_valid_config(config_path)?;
    init_tracing(config.log_file.as_deref())?;
    let client = google_client(&config)?;
    let reports = verify_access(&client, &config.sources(), chrono::Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let id = report.calendar_id.as_deref().unwrap_or("-");
            match &report.outcome {
                AccessOutcome::Ok { upcoming } => {
                    println!("ok      {} ({id})", report.identifier);
                    if upcoming.is_empty() {
                        println!("        no upcoming events");
                    }
                    for title in upcoming {
                        println!("        {title}");
                    }
                }
                AccessOutcome::Failed { reason } => {
                    println!("FAILED  {} ({id}): {reason}", report.identifier);
                }
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} source calendars are not readable", reports.len()).into());
    }
    Ok(())
}
