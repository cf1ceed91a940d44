use std::path::Path;

use calmirror_core::{MappingDb, MappingStore};
use clap::Subcommand;

use super::{load_config, CmdResult};

#[derive(Subcommand)]
pub enum MappingsAction {
    /// List every source event and its mirror
    List {
        #[arg(long)]
        json: bool,
    },
    /// Number of mapped events
    Count,
}

pub fn run(config_path: Option<&Path>, action: MappingsAction) -> CmdResult {
    let config = load_config(config_path)?;
    let db = MappingDb::open(&config.database_path()?)?;

    match action {
        MappingsAction::List { json } => {
            let records = db.all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for r in &records {
                    println!(
                        "{}\t{}\t{}",
                        r.source_calendar_id, r.source_event_id, r.target_event_id
                    );
                }
            }
        }
        MappingsAction::Count => println!("{}", db.count()?),
    }
    Ok(())
}
