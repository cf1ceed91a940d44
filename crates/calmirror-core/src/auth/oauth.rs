//! OAuth2 Authorization Code flow for a desktop login.
//!
//! 1. Opens browser to the Google consent page
//! 2. Waits on a localhost listener for the redirect
//! 3. Exchanges the code for an access token (+ refresh token)
//! 4. Stores tokens in the OS keyring

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::keyring_store;
use crate::error::OAuthError;

/// Scope needed to read sources and write the target calendar.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const CALLBACK_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>, // Unix timestamp
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    /// Google settings for the calendar scope.
    pub fn google(client_id: &str, client_secret: &str, token_url: &str) -> Self {
        Self {
            service_name: "google".to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_url: AUTH_URL.to_string(),
            token_url: token_url.to_string(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            redirect_port: 19822,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self) -> String {
        let mut url = match url::Url::parse(&self.auth_url) {
            Ok(url) => url,
            Err(_) => return self.auth_url.clone(),
        };
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url.into()
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh: Option<&str>) -> Result<OAuthTokens, String> {
        if let Some(error) = self.error {
            return Err(match self.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            });
        }
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "response carried no access_token".to_string())?;
        Ok(OAuthTokens {
            access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(String::from)),
            expires_at: self
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: self.scope,
        })
    }
}

/// Run the full OAuth2 flow: open browser -> wait for callback -> exchange code.
pub async fn authorize(config: &OAuthConfig) -> Result<OAuthTokens, OAuthError> {
    let listener = TcpListener::bind(("127.0.0.1", config.redirect_port))
        .await
        .map_err(|e| OAuthError::AuthorizationFailed(format!("cannot listen for callback: {e}")))?;

    let auth_url = config.auth_url_full();
    if open::that(&auth_url).is_err() {
        tracing::warn!("could not open a browser; visit {auth_url}");
    }

    let accept = tokio::time::timeout(
        Duration::from_secs(CALLBACK_TIMEOUT_SECS),
        listener.accept(),
    );
    let (mut stream, _) = accept
        .await?
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;

    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let code = match extract_code(&request) {
        Some(code) => code,
        None => {
            let reason = extract_param(&request, "error").unwrap_or_else(|| "no code in callback".into());
            return Err(OAuthError::AuthorizationFailed(reason));
        }
    };

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h2>calmirror is authorized.</h2><p>You can close this tab.</p></body></html>";
    // The browser page is cosmetic; the code is already in hand.
    let _ = stream.write_all(response.as_bytes()).await;
    drop(stream);
    drop(listener);

    let tokens = exchange_code(config, &code).await?;
    store_tokens(&config.service_name, &tokens)?;
    Ok(tokens)
}

/// Exchange authorization code for tokens.
async fn exchange_code(config: &OAuthConfig, code: &str) -> Result<OAuthTokens, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let body: TokenResponse = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?
        .json()
        .await
        .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

    body.into_tokens(None).map_err(OAuthError::TokenExchangeFailed)
}

/// Refresh an access token using a refresh token, persisting the result.
pub async fn refresh_token(config: &OAuthConfig, refresh: &str) -> Result<OAuthTokens, OAuthError> {
    let tokens = request_refresh(config, refresh).await?;
    store_tokens(&config.service_name, &tokens)?;
    Ok(tokens)
}

async fn request_refresh(config: &OAuthConfig, refresh: &str) -> Result<OAuthTokens, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let body: TokenResponse = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?
        .json()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

    body.into_tokens(Some(refresh))
        .map_err(OAuthError::TokenRefreshFailed)
}

fn store_tokens(service_name: &str, tokens: &OAuthTokens) -> Result<(), OAuthError> {
    let json = serde_json::to_string(tokens)
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;
    keyring_store::set(service_name, &json)?;
    Ok(())
}

/// Load stored tokens from keyring.
pub fn load_tokens(service_name: &str) -> Option<OAuthTokens> {
    keyring_store::get(service_name)
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok())
}

/// Check if stored tokens are expired (with 60s buffer).
pub fn is_expired(tokens: &OAuthTokens) -> bool {
    match tokens.expires_at {
        Some(exp) => chrono::Utc::now().timestamp() > exp - 60,
        None => false,
    }
}

fn extract_code(request: &str) -> Option<String> {
    extract_param(request, "code")
}

fn extract_param(request: &str, name: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token_url: &str) -> OAuthConfig {
        OAuthConfig::google("client-1", "secret-1", token_url)
    }

    #[test]
    fn auth_url_requests_offline_calendar_access() {
        let url = url::Url::parse(&config("https://oauth2.example/token").auth_url_full()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(pairs["scope"], CALENDAR_SCOPE);
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["redirect_uri"], "http://localhost:19822/callback");
    }

    #[test]
    fn extracts_code_from_callback_request() {
        let req = "GET /callback?code=4%2F0Abc&scope=x HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(extract_code(req).as_deref(), Some("4/0Abc"));
        assert_eq!(extract_param("GET /callback?error=access_denied HTTP/1.1", "error").as_deref(), Some("access_denied"));
        assert!(extract_code("GET /callback HTTP/1.1").is_none());
    }

    #[test]
    fn expiry_uses_sixty_second_buffer() {
        let now = chrono::Utc::now().timestamp();
        let mut tokens = OAuthTokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Some(now + 30),
            token_type: "Bearer".into(),
            scope: None,
        };
        assert!(is_expired(&tokens));
        tokens.expires_at = Some(now + 3600);
        assert!(!is_expired(&tokens));
        tokens.expires_at = None;
        assert!(!is_expired(&tokens));
    }

    #[test]
    fn refresh_keeps_previous_refresh_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_body(r#"{"access_token":"fresh","expires_in":3599,"token_type":"Bearer"}"#)
            .create();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let cfg = config(&format!("{}/token", server.url()));
        let tokens = rt.block_on(request_refresh(&cfg, "old-refresh")).unwrap();

        mock.assert();
        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
        assert!(tokens.expires_at.is_some());
    }

    #[test]
    fn refresh_error_is_reported() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#)
            .create();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let cfg = config(&format!("{}/token", server.url()));
        let err = rt.block_on(request_refresh(&cfg, "revoked")).unwrap_err();
        assert!(matches!(err, OAuthError::TokenRefreshFailed(msg) if msg.contains("invalid_grant")));
    }
}
