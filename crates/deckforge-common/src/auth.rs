//! OAuth 2.0 credential handling for the Google document services.
//!
//! Implements the authorization-code flow with PKCE using `reqwest` for HTTP
//! and `sha2` for the code challenge, plus a [`TokenProvider`] abstraction so
//! the API clients never touch token storage directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::CommonError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes needed to copy the template, edit it, and rewrite the chart sheet.
pub const GOOGLE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/presentations",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// Configuration required to run an OAuth 2.0 flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Google endpoints with the Slides/Drive/Sheets scopes.
    pub fn google(client_id: String, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            redirect_uri: "http://localhost".to_string(),
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A bearer token as persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
}

impl OAuthToken {
    /// Whether the token has expired, with a 30-second safety margin.
    /// Tokens without expiry information are assumed still valid.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() >= at - chrono::Duration::seconds(30),
            None => false,
        }
    }
}

/// Raw JSON shape returned by the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

impl From<TokenResponse> for OAuthToken {
    fn from(raw: TokenResponse) -> Self {
        OAuthToken {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            expires_at: raw
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}

/// Generate a random code verifier (43-128 unreserved characters, RFC 7636).
fn generate_code_verifier() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::rng();
    let len = rng.random_range(43..=128);
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// S256 code challenge: BASE64URL(SHA256(code_verifier)), no padding.
fn code_challenge(verifier: &str) -> String {
    base64url(&Sha256::digest(verifier.as_bytes()))
}

/// BASE64-URL encoding without padding (RFC 4648 §5).
fn base64url(data: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let n = (chunk[0] as u32) << 16
            | (chunk.get(1).copied().unwrap_or(0) as u32) << 8
            | chunk.get(2).copied().unwrap_or(0) as u32;
        out.push(TABLE[(n >> 18 & 0x3F) as usize] as char);
        out.push(TABLE[(n >> 12 & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            out.push(TABLE[(n >> 6 & 0x3F) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(TABLE[(n & 0x3F) as usize] as char);
        }
    }
    out
}

/// Random state string for CSRF protection.
fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// OAuth 2.0 client for the authorization-code + PKCE flow.
pub struct OAuthClient {
    config: OAuthConfig,
    http: Client,
    code_verifier: String,
}

impl OAuthClient {
    /// Create a client with a freshly generated PKCE verifier.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_verifier(config, generate_code_verifier())
    }

    /// Create a client with a previously persisted PKCE verifier, so the
    /// authorization URL and the code exchange can run in separate processes.
    pub fn with_verifier(config: OAuthConfig, code_verifier: String) -> Self {
        Self {
            config,
            http: Client::new(),
            code_verifier,
        }
    }

    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// Build the consent URL the user must visit.
    ///
    /// Returns `(url, state)`; `state` should be checked on callback.
    pub fn authorization_url(&self) -> (String, String) {
        let state = generate_state();
        let challenge = code_challenge(&self.code_verifier);
        let scope = self.config.scopes.join(" ");

        let url = format!(
            "{}?response_type=code&access_type=offline&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.auth_url,
            crate::percent_encode(&self.config.client_id),
            crate::percent_encode(&self.config.redirect_uri),
            crate::percent_encode(&scope),
            crate::percent_encode(&state),
            crate::percent_encode(&challenge),
        );

        debug!(url = %url, "built authorization URL");
        (url, state)
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, CommonError> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", self.code_verifier.clone()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }
        self.token_request(&params).await
    }

    /// Obtain a fresh token via the refresh_token grant.
    pub async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken, CommonError> {
        let refresh = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| CommonError::Auth("no refresh token available".to_string()))?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh.to_string()),
            ("client_id", self.config.client_id.clone()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let mut fresh = self.token_request(&params).await?;
        // Google omits the refresh token on refresh responses; keep the old one.
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = token.refresh_token.clone();
        }
        Ok(fresh)
    }

    async fn token_request(&self, params: &[(&str, String)]) -> Result<OAuthToken, CommonError> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CommonError::from_response("oauth", resp).await);
        }
        let raw: TokenResponse = resp.json().await?;
        Ok(raw.into())
    }
}

/// Capability: produce a valid bearer token, refreshing if necessary.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, CommonError>;
}

/// A fixed token, taken from the environment or injected by tests.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, CommonError> {
        Ok(self.token.clone())
    }
}

/// Token provider backed by a JSON file, refreshing through OAuth when the
/// stored access token has expired.
pub struct RefreshingTokenProvider {
    oauth: OAuthClient,
    path: PathBuf,
    cached: tokio::sync::Mutex<Option<OAuthToken>>,
}

impl RefreshingTokenProvider {
    pub fn new(oauth: OAuthClient, path: impl Into<PathBuf>) -> Self {
        Self {
            oauth,
            path: path.into(),
            cached: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for RefreshingTokenProvider {
    async fn bearer_token(&self) -> Result<String, CommonError> {
        let mut cached = self.cached.lock().await;

        let token = match cached.take() {
            Some(token) => token,
            None => load_token(&self.path)?,
        };

        if !token.is_expired() {
            let access = token.access_token.clone();
            *cached = Some(token);
            return Ok(access);
        }

        info!("access token expired, refreshing");
        let fresh = self.oauth.refresh(&token).await?;
        save_token(&self.path, &fresh)?;
        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }
}

/// Load a persisted token, mapping a missing file to an actionable error.
pub fn load_token(path: &Path) -> Result<OAuthToken, CommonError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CommonError::Auth(format!(
            "no stored token at {} ({e}); run `deckforge auth-url` then `deckforge auth <code>`",
            path.display()
        ))
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persist a token for future runs.
pub fn save_token(path: &Path, token: &OAuthToken) -> Result<(), CommonError> {
    let json = serde_json::to_string_pretty(token)?;
    std::fs::write(path, json)
        .map_err(|e| CommonError::Auth(format!("failed to write {}: {e}", path.display())))
}

/// Convenience alias used by the API clients.
pub type SharedTokenProvider = Arc<dyn TokenProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> OAuthConfig {
        OAuthConfig::google("test-client-id".into(), Some("test-secret".into()))
    }

    #[test]
    fn google_config_has_three_scopes() {
        let cfg = sample_config();
        assert_eq!(cfg.scopes.len(), 3);
        assert!(cfg.scopes.iter().any(|s| s.ends_with("/presentations")));
        assert_eq!(cfg.token_url, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn code_challenge_matches_rfc7636_vector() {
        // RFC 7636 appendix B.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn base64url_handles_all_remainders() {
        assert_eq!(base64url(b""), "");
        assert_eq!(base64url(b"f"), "Zg");
        assert_eq!(base64url(b"fo"), "Zm8");
        assert_eq!(base64url(b"foo"), "Zm9v");
        assert_eq!(base64url(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn verifier_length_in_rfc_range() {
        for _ in 0..16 {
            let v = generate_code_verifier();
            assert!((43..=128).contains(&v.len()), "len {}", v.len());
        }
    }

    #[test]
    fn authorization_url_carries_pkce_params() {
        let client = OAuthClient::new(sample_config());
        let (url, state) = client.authorization_url();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={state}")));
    }

    #[test]
    fn verifier_survives_reconstruction() {
        let client = OAuthClient::new(sample_config());
        let verifier = client.code_verifier().to_string();
        let again = OAuthClient::with_verifier(sample_config(), verifier.clone());
        assert_eq!(again.code_verifier(), verifier);
    }

    #[test]
    fn token_without_expiry_is_not_expired() {
        let token = OAuthToken {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
            token_type: "Bearer".into(),
        };
        assert!(!token.is_expired());
    }

    #[test]
    fn token_expiry_margin() {
        let mut token = OAuthToken {
            access_token: "tok".into(),
            refresh_token: Some("r".into()),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(10)),
            token_type: "Bearer".into(),
        };
        // inside the 30s margin
        assert!(token.is_expired());
        token.expires_at = Some(Utc::now() + chrono::Duration::seconds(120));
        assert!(!token.is_expired());
    }

    #[test]
    fn token_file_roundtrip() {
        let token = OAuthToken {
            access_token: "ya29.abc".into(),
            refresh_token: Some("1//refresh".into()),
            expires_at: Some(Utc::now()),
            token_type: "Bearer".into(),
        };
        let dir = std::env::temp_dir().join(format!("deckforge-token-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("token.json");
        save_token(&path, &token).unwrap();
        let back = load_token(&path).unwrap();
        assert_eq!(back.access_token, "ya29.abc");
        assert_eq!(back.refresh_token.as_deref(), Some("1//refresh"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_token_file_mentions_auth_command() {
        let err = load_token(Path::new("/nonexistent/deckforge/token.json")).unwrap_err();
        assert!(err.to_string().contains("deckforge auth"));
    }

    #[tokio::test]
    async fn static_provider_returns_token() {
        let provider = StaticTokenProvider::new("tok".into());
        assert_eq!(provider.bearer_token().await.unwrap(), "tok");
    }

    #[test]
    fn token_response_defaults_token_type() {
        let raw: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3600}"#).unwrap();
        let token: OAuthToken = raw.into();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_some());
        assert!(token.refresh_token.is_none());
    }
}
