use std::collections::BTreeMap;
use std::path::Path;

use calmirror_core::logging::init_tracing;
use calmirror_core::CalendarService;

use super::{google_client, load_config, CmdResult};

pub fn run(config_path: Option<&Path>, json: bool) -> CmdResult {
    let config = load_config(config_path)?;
    init_tracing(config.log_file.as_deref())?;
    let client = google_client(&config)?;
    let directory = client.list_calendars()?;
    tracing::info!(count = directory.len(), "listed visible calendars");

    if json {
        let map: BTreeMap<&str, &str> = directory.iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if directory.is_empty() {
        println!("No calendars visible.");
    }
    for (name, id) in directory.iter() {
        println!("{name:<32} {id}");
    }
    Ok(())
}
