use std::path::Path;

use calmirror_core::auth::{self, oauth, TokenSource, ACCESS_TOKEN_ENV};
use calmirror_core::storage::GoogleConfig;
use clap::Subcommand;

use super::{config_path, CmdResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Authorize calmirror in the browser and store tokens in the keyring
    Login {
        /// OAuth client ID (stored in the keyring)
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth client secret (stored in the keyring)
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Remove stored tokens and client credentials
    Logout,
    /// Show where the access token would come from
    Status,
}

pub fn run(config_path_arg: Option<&Path>, action: AuthAction) -> CmdResult {
    let google = google_settings(config_path_arg)?;
    match action {
        AuthAction::Login {
            client_id,
            client_secret,
        } => {
            match (client_id, client_secret) {
                (Some(id), Some(secret)) => auth::store_client_credentials(&id, &secret)?,
                (None, None) => {}
                _ => return Err("--client-id and --client-secret go together".into()),
            }
            let oauth_config = auth::google_oauth_config(&google)?;
            println!("Waiting for authorization in the browser...");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(oauth::authorize(&oauth_config))?;
            println!("Google authenticated");
        }
        AuthAction::Logout => {
            auth::logout()?;
            println!("Google credentials removed");
        }
        AuthAction::Status => match TokenSource::from_env(&google) {
            TokenSource::Static(_) => println!("using {ACCESS_TOKEN_ENV}"),
            TokenSource::Stored(_) => match oauth::load_tokens("google") {
                Some(tokens) if oauth::is_expired(&tokens) => {
                    if tokens.refresh_token.is_some() {
                        println!("authenticated (token expired, will refresh)");
                    } else {
                        println!("token expired; run `calmirror auth login`");
                    }
                }
                Some(_) => println!("authenticated"),
                None => println!("not authenticated"),
            },
        },
    }
    Ok(())
}

/// Google settings from the config file, if there is one.
fn google_settings(explicit: Option<&Path>) -> Result<GoogleConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit)?;
    if !path.exists() {
        return Ok(GoogleConfig::default());
    }
    Ok(calmirror_core::Config::load_from(&path)?.google)
}
