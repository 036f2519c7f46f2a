//! Google OAuth2 tokens for the Gmail and Photos APIs
//!
//! Tokens are stored on disk in the authorized-user JSON layout, so a
//! token file produced by other Google tooling works unchanged. The
//! flow is: classify the stored token, refresh it over the token
//! endpoint when it has expired, and fall back to a one-shot loopback
//! consent flow when there is nothing usable on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub const SCOPE_GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
pub const SCOPE_PHOTOS_APPEND: &str = "https://www.googleapis.com/auth/photoslibrary.appendonly";

/// One token file covers both capabilities, so a single consent grants
/// everything the tool can do.
pub const SCOPES: &[&str] = &[SCOPE_GMAIL_SEND, SCOPE_PHOTOS_APPEND];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Treat tokens expiring within a minute as already expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// On-disk token in Google's authorized-user JSON layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Access token (the authorized-user format calls this `token`).
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid,
    Expired { has_refresh: bool },
    Missing,
}

/// Classify a stored token against the current time. A token without a
/// recorded expiry is assumed to still be valid.
pub fn classify(token: Option<&StoredToken>, now: DateTime<Utc>) -> TokenState {
    match token {
        None => TokenState::Missing,
        Some(tok) => match tok.expiry {
            Some(expiry) if expiry <= now + chrono::Duration::seconds(EXPIRY_LEEWAY_SECS) => {
                TokenState::Expired {
                    has_refresh: tok.refresh_token.is_some(),
                }
            }
            _ => TokenState::Valid,
        },
    }
}

/// What the current credential situation allows.
#[derive(Debug)]
pub enum Access {
    /// A usable token, either fresh from disk or just refreshed.
    Ready(StoredToken),
    /// Nothing usable on disk, but a consent flow could fix that.
    NeedsConsent,
    /// No way forward without operator intervention.
    Fatal(String),
}

/// OAuth client secret as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

/// The console wraps the secret in either an `installed` or a `web`
/// section depending on the configured application type.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// Token endpoint response for both the refresh and code-exchange grants.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct Authenticator {
    http: reqwest::Client,
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl Authenticator {
    pub fn new(token_path: &Path, credentials_path: &Path) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            token_path: token_path.to_path_buf(),
            credentials_path: credentials_path.to_path_buf(),
        })
    }

    /// Whether a consent flow could even be attempted.
    pub fn has_client_secret(&self) -> bool {
        self.credentials_path.exists()
    }

    /// Produce a usable access token, refreshing or running the consent
    /// flow as needed. Refreshed and newly granted tokens are written
    /// back to the token file.
    pub async fn access_token(&self) -> Result<String> {
        match self.resolve().await? {
            Access::Ready(token) => Ok(token.token),
            Access::NeedsConsent => {
                let fresh = self.consent().await?;
                self.save_token(&fresh)?;
                Ok(fresh.token)
            }
            Access::Fatal(reason) => {
                log::error!("{}", reason);
                bail!("{}", reason);
            }
        }
    }

    /// Work out what the stored credentials allow right now. Refresh
    /// happens here because its outcome decides the state; refresh
    /// endpoint failures propagate rather than degrade.
    pub async fn resolve(&self) -> Result<Access> {
        let stored = self.load_token();
        let state = classify(stored.as_ref(), Utc::now());
        log::debug!("token state: {:?}", state);
        match (state, stored) {
            (TokenState::Valid, Some(tok)) => Ok(Access::Ready(tok)),
            (TokenState::Expired { has_refresh: true }, Some(tok)) => {
                let refreshed = self.refresh(&tok).await?;
                self.save_token(&refreshed)?;
                Ok(Access::Ready(refreshed))
            }
            _ if self.has_client_secret() => Ok(Access::NeedsConsent),
            _ => Ok(Access::Fatal(format!(
                "no usable token and no client secret at {}",
                self.credentials_path.display()
            ))),
        }
    }

    /// Read the token file. An absent file is the normal first-run
    /// state; an unreadable one is logged and treated the same, which
    /// forces a fresh consent.
    pub fn load_token(&self) -> Option<StoredToken> {
        let raw = match fs::read_to_string(&self.token_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("could not read {}: {}", self.token_path.display(), err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                log::warn!("ignoring malformed {}: {}", self.token_path.display(), err);
                None
            }
        }
    }

    fn save_token(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_path, json)
            .with_context(|| format!("failed to write {}", self.token_path.display()))?;
        log::info!("saved token to {}", self.token_path.display());
        Ok(())
    }

    fn load_client_secret(&self) -> Result<ClientSecret> {
        let raw = fs::read_to_string(&self.credentials_path).with_context(|| {
            format!(
                "OAuth client secret not found at {}",
                self.credentials_path.display()
            )
        })?;
        let file: ClientSecretFile = serde_json::from_str(&raw)
            .with_context(|| format!("malformed client secret {}", self.credentials_path.display()))?;
        file.installed
            .or(file.web)
            .context("client secret has neither an \"installed\" nor a \"web\" section")
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .context("stored token has no refresh token")?;
        log::info!("refreshing expired access token");
        let response = self
            .http
            .post(&token.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
            ])
            .send()
            .await
            .context("token refresh request failed")?;
        let grant = read_grant(response).await?;
        Ok(StoredToken {
            token: grant.access_token,
            // Google usually omits the refresh token here; keep the old one.
            refresh_token: grant.refresh_token.or_else(|| token.refresh_token.clone()),
            expiry: expiry_from(grant.expires_in),
            ..token.clone()
        })
    }

    /// Interactive one-shot consent: bind a loopback redirect port, log
    /// the authorization URL for the user to open, then trade the code
    /// for tokens.
    async fn consent(&self) -> Result<StoredToken> {
        let secret = self.load_client_secret()?;
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("could not bind loopback listener for the OAuth redirect")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let mut auth_url = Url::parse(&secret.auth_uri)
            .with_context(|| format!("invalid auth_uri {}", secret.auth_uri))?;
        auth_url
            .query_pairs_mut()
            .append_pair("client_id", &secret.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        log::info!("authorize access by opening this URL in a browser:\n{}", auth_url);

        let code = wait_for_code(listener).await?;
        log::info!("authorization code received, exchanging it for tokens");
        let response = self
            .http
            .post(&secret.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .context("authorization code exchange failed")?;
        let grant = read_grant(response).await?;
        Ok(StoredToken {
            token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry: expiry_from(grant.expires_in),
        })
    }
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

async fn read_grant(response: reqwest::Response) -> Result<TokenGrant> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("token endpoint returned {}: {}", status, body.trim());
    }
    response
        .json()
        .await
        .context("token endpoint returned malformed JSON")
}

/// Serve the loopback redirect until Google sends the user back with a
/// code. Browsers also probe for things like favicons, so everything
/// without a code or error parameter gets a 204 and another accept.
async fn wait_for_code(listener: TcpListener) -> Result<String> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .context("failed to accept the OAuth redirect connection")?;
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]).into_owned();
        let path = request
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("/");
        let url = Url::parse(&format!("http://127.0.0.1{}", path))
            .context("malformed redirect request")?;

        if let Some((_, reason)) = url.query_pairs().find(|(key, _)| key == "error") {
            respond(&mut stream, "400 Bad Request", "Authorization failed.").await;
            bail!("authorization was denied: {}", reason);
        }
        if let Some((_, code)) = url.query_pairs().find(|(key, _)| key == "code") {
            respond(
                &mut stream,
                "200 OK",
                "The authentication flow has completed. You may close this window.",
            )
            .await;
            return Ok(code.into_owned());
        }
        respond(&mut stream, "204 No Content", "").await;
    }
}

async fn respond(stream: &mut tokio::net::TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(err) = stream.write_all(response.as_bytes()).await {
        log::warn!("could not answer the OAuth redirect: {}", err);
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            token: "ya29.access".to_string(),
            refresh_token: refresh.map(|s| s.to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "id.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_classify_missing() {
        assert_eq!(classify(None, at(12)), TokenState::Missing);
    }

    #[test]
    fn test_classify_valid_without_expiry() {
        assert_eq!(classify(Some(&token(None, None)), at(12)), TokenState::Valid);
    }

    #[test]
    fn test_classify_valid_with_future_expiry() {
        let tok = token(Some(at(13)), Some("r"));
        assert_eq!(classify(Some(&tok), at(12)), TokenState::Valid);
    }

    #[test]
    fn test_classify_expired_with_refresh() {
        let tok = token(Some(at(11)), Some("r"));
        assert_eq!(
            classify(Some(&tok), at(12)),
            TokenState::Expired { has_refresh: true }
        );
    }

    #[test]
    fn test_classify_expired_without_refresh() {
        let tok = token(Some(at(11)), None);
        assert_eq!(
            classify(Some(&tok), at(12)),
            TokenState::Expired { has_refresh: false }
        );
    }

    #[test]
    fn test_classify_expiring_within_leeway_counts_as_expired() {
        let now = at(12);
        let tok = token(Some(now + chrono::Duration::seconds(30)), Some("r"));
        assert_eq!(
            classify(Some(&tok), now),
            TokenState::Expired { has_refresh: true }
        );
    }

    #[test]
    fn test_stored_token_reads_authorized_user_json() {
        let raw = r#"{
            "token": "ya29.a0AfH6",
            "refresh_token": "1//0gL",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "GOCSPX-abc",
            "scopes": ["https://www.googleapis.com/auth/gmail.send"],
            "expiry": "2025-03-01T12:00:00Z"
        }"#;
        let tok: StoredToken = serde_json::from_str(raw).unwrap();
        assert_eq!(tok.token, "ya29.a0AfH6");
        assert_eq!(tok.refresh_token.as_deref(), Some("1//0gL"));
        assert_eq!(tok.expiry, Some(at(12)));

        let round = serde_json::to_string(&tok).unwrap();
        let back: StoredToken = serde_json::from_str(&round).unwrap();
        assert_eq!(back.client_id, tok.client_id);
        assert_eq!(back.expiry, tok.expiry);
    }

    #[test]
    fn test_stored_token_defaults_token_uri() {
        let raw = r#"{"token": "t", "client_id": "c", "client_secret": "s"}"#;
        let tok: StoredToken = serde_json::from_str(raw).unwrap();
        assert_eq!(tok.token_uri, DEFAULT_TOKEN_URI);
        assert!(tok.refresh_token.is_none());
        assert!(tok.expiry.is_none());
    }

    #[test]
    fn test_client_secret_installed_section() {
        let raw = r#"{"installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "GOCSPX-abc",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]
        }}"#;
        let file: ClientSecretFile = serde_json::from_str(raw).unwrap();
        let secret = file.installed.or(file.web).unwrap();
        assert_eq!(secret.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secret.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn test_client_secret_web_section() {
        let raw = r#"{"web": {"client_id": "c", "client_secret": "s"}}"#;
        let file: ClientSecretFile = serde_json::from_str(raw).unwrap();
        let secret = file.installed.or(file.web).unwrap();
        assert_eq!(secret.client_id, "c");
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_load_token_absent_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(
            &dir.path().join("token.json"),
            &dir.path().join("credentials.json"),
        )
        .unwrap();
        assert!(auth.load_token().is_none());
        assert!(!auth.has_client_secret());
    }

    #[tokio::test]
    async fn test_resolve_valid_token_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let json = serde_json::to_string(&token(None, Some("r"))).unwrap();
        std::fs::write(&token_path, json).unwrap();
        let auth =
            Authenticator::new(&token_path, &dir.path().join("credentials.json")).unwrap();
        match auth.resolve().await.unwrap() {
            Access::Ready(tok) => assert_eq!(tok.token, "ya29.access"),
            other => panic!("unexpected access: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_without_anything_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(
            &dir.path().join("token.json"),
            &dir.path().join("credentials.json"),
        )
        .unwrap();
        assert!(matches!(auth.resolve().await.unwrap(), Access::Fatal(_)));
    }

    #[tokio::test]
    async fn test_resolve_with_secret_but_no_token_needs_consent() {
        let dir = tempfile::tempdir().unwrap();
        let credentials_path = dir.path().join("credentials.json");
        std::fs::write(
            &credentials_path,
            r#"{"installed": {"client_id": "c", "client_secret": "s"}}"#,
        )
        .unwrap();
        let auth = Authenticator::new(&dir.path().join("token.json"), &credentials_path).unwrap();
        assert!(matches!(
            auth.resolve().await.unwrap(),
            Access::NeedsConsent
        ));
    }
}
