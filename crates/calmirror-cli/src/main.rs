use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "calmirror",
    version,
    about = "Mirror several Google Calendars into one target calendar"
)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/calmirror/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation cycle
    Sync {
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check read access to every source calendar
    Verify {
        #[arg(long)]
        json: bool,
    },
    /// List calendars visible to the authenticated principal
    Calendars {
        #[arg(long)]
        json: bool,
    },
    /// Inspect the source -> mirror mapping table
    Mappings {
        #[command(subcommand)]
        action: commands::mappings::MappingsAction,
    },
    /// Google authorization
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Sync { dry_run, json } => commands::sync::run(config, dry_run, json),
        Commands::Verify { json } => commands::verify::run(config, json),
        Commands::Calendars { json } => commands::calendars::run(config, json),
        Commands::Mappings { action } => commands::mappings::run(config, action),
        Commands::Auth { action } => commands::auth::run(config, action),
        Commands::Config { action } => commands::config::run(config, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
