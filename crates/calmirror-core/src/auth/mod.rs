//! Credentials for the calendar service.
//!
//! Acquiring credentials is outside the mirror itself: either an externally
//! minted bearer token is supplied via `CALMIRROR_ACCESS_TOKEN`, or the
//! tokens saved by `calmirror auth login` are read from the OS keyring and
//! refreshed when expired.

pub mod oauth;

pub use oauth::{OAuthConfig, OAuthTokens};

use crate::error::OAuthError;
use crate::storage::GoogleConfig;

/// Environment variable holding a ready-to-use bearer token.
pub const ACCESS_TOKEN_ENV: &str = "CALMIRROR_ACCESS_TOKEN";

const CLIENT_ID_KEY: &str = "google_client_id";
const CLIENT_SECRET_KEY: &str = "google_client_secret";

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    const SERVICE: &str = "calmirror";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Persist Google OAuth client credentials to the OS keyring.
pub fn store_client_credentials(client_id: &str, client_secret: &str) -> Result<(), OAuthError> {
    keyring_store::set(CLIENT_ID_KEY, client_id)?;
    keyring_store::set(CLIENT_SECRET_KEY, client_secret)?;
    Ok(())
}

/// Remove stored tokens and client credentials.
pub fn logout() -> Result<(), OAuthError> {
    keyring_store::delete("google")?;
    keyring_store::delete(CLIENT_ID_KEY)?;
    keyring_store::delete(CLIENT_SECRET_KEY)?;
    Ok(())
}

/// Build the OAuth settings, preferring values from the config file over
/// the keyring.
pub fn google_oauth_config(google: &GoogleConfig) -> Result<OAuthConfig, OAuthError> {
    let from_keyring = |key: &str| keyring_store::get(key).ok().flatten();
    let client_id = google
        .client_id
        .clone()
        .or_else(|| from_keyring(CLIENT_ID_KEY))
        .filter(|s| !s.is_empty());
    let client_secret = google
        .client_secret
        .clone()
        .or_else(|| from_keyring(CLIENT_SECRET_KEY))
        .filter(|s| !s.is_empty());

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => Ok(OAuthConfig::google(&id, &secret, &google.token_url)),
        _ => Err(OAuthError::CredentialsNotConfigured {
            service: "google".into(),
        }),
    }
}

/// Where an access token for this run comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Externally minted token, used as-is.
    Static(String),
    /// Keyring-backed tokens from `auth login`, refreshed when expired.
    Stored(GoogleConfig),
}

impl TokenSource {
    /// `CALMIRROR_ACCESS_TOKEN` wins when set and non-empty.
    pub fn from_env(google: &GoogleConfig) -> Self {
        Self::choose(std::env::var(ACCESS_TOKEN_ENV).ok(), google)
    }

    fn choose(env_token: Option<String>, google: &GoogleConfig) -> Self {
        match env_token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(token) => TokenSource::Static(token),
            None => TokenSource::Stored(google.clone()),
        }
    }

    /// A currently valid access token.
    pub fn access_token(&self) -> Result<String, OAuthError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Stored(google) => {
                let tokens = oauth::load_tokens("google").ok_or_else(|| {
                    OAuthError::NotAuthenticated {
                        service: "google".into(),
                    }
                })?;
                if !oauth::is_expired(&tokens) {
                    return Ok(tokens.access_token);
                }

                let refresh = tokens
                    .refresh_token
                    .as_deref()
                    .ok_or(OAuthError::TokenExpired)?;
                let config = google_oauth_config(google)?;
                tracing::debug!("access token expired, refreshing");

                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;
                let refreshed = runtime.block_on(oauth::refresh_token(&config, refresh))?;
                Ok(refreshed.access_token)
            }
        }
    }

    /// Human-readable origin of the token, for status output.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenSource::Static(_) => "environment token",
            TokenSource::Stored(_) => "keyring tokens",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_token_takes_precedence() {
        let google = GoogleConfig::default();
        let source = TokenSource::choose(Some(" ya29.token \n".into()), &google);
        assert!(matches!(&source, TokenSource::Static(t) if t == "ya29.token"));
        assert_eq!(source.access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn blank_env_token_falls_back_to_keyring() {
        let google = GoogleConfig::default();
        assert!(matches!(
            TokenSource::choose(Some("   ".into()), &google),
            TokenSource::Stored(_)
        ));
        assert!(matches!(TokenSource::choose(None, &google), TokenSource::Stored(_)));
    }

    #[test]
    fn config_credentials_build_oauth_config() {
        let google = GoogleConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..GoogleConfig::default()
        };
        let cfg = google_oauth_config(&google).unwrap();
        assert_eq!(cfg.client_id, "id");
        assert_eq!(cfg.token_url, crate::storage::GoogleConfig::default().token_url);
    }
}
