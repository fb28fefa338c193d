use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::config::CredentialsConfig;
use crate::TranscriberError;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const EXPIRY_SKEW_SECS: u64 = 60;

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: u64,
    iat: u64,
}

/// Fields of a service-account key file needed for the JWT bearer grant
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: u64,
}

impl CachedToken {
    fn is_fresh(&self, now: u64) -> bool {
        self.expires_at.saturating_sub(now) > EXPIRY_SKEW_SECS
    }
}

#[derive(Debug)]
enum TokenKind {
    Static(String),
    ServiceAccount(ServiceAccountKey),
    MetadataServer(String),
}

/// Supplies bearer tokens for Google API calls
#[derive(Debug)]
pub struct TokenProvider {
    kind: TokenKind,
    cache: Mutex<Option<CachedToken>>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TokenProvider {
    /// Pick a token source: explicit token, then service-account key file, then the metadata server
    pub fn from_config(credentials: &CredentialsConfig) -> Result<Self> {
        if let Some(token) = &credentials.access_token {
            return Ok(Self::fixed(token.clone()));
        }

        if let Some(path) = &credentials.service_account_path {
            let content = fs_err::read_to_string(path)
                .context("Failed to read service account key")?;
            let key: ServiceAccountKey = serde_json::from_str(&content)
                .context("Failed to parse service account key")?;
            tracing::info!(account = %key.client_email, "Using service account credentials");
            return Ok(Self::new(TokenKind::ServiceAccount(key)));
        }

        tracing::info!("Using metadata server credentials");
        Ok(Self::metadata_server(METADATA_TOKEN_URL))
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self::new(TokenKind::Static(token.into()))
    }

    pub fn metadata_server(url: impl Into<String>) -> Self {
        Self::new(TokenKind::MetadataServer(url.into()))
    }

    fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            cache: Mutex::new(None),
        }
    }

    /// Current access token, refreshed when it is about to expire
    pub async fn token(&self, client: &Client) -> Result<String, TranscriberError> {
        if let TokenKind::Static(token) = &self.kind {
            return Ok(token.clone());
        }

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(now_secs()) {
                return Ok(cached.access_token.clone());
            }
        }

        let fetched = match &self.kind {
            TokenKind::ServiceAccount(key) => fetch_service_account_token(client, key).await?,
            TokenKind::MetadataServer(url) => fetch_metadata_token(client, url).await?,
            TokenKind::Static(token) => return Ok(token.clone()),
        };

        let token = fetched.access_token.clone();
        *cache = Some(fetched);
        Ok(token)
    }
}

async fn fetch_service_account_token(
    client: &Client,
    key: &ServiceAccountKey,
) -> Result<CachedToken, TranscriberError> {
    let now = now_secs();
    let claims = Claims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        exp: now + 3600,
        iat: now,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| TranscriberError::Auth(format!("invalid private key: {}", e)))?;
    let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| TranscriberError::Auth(format!("failed to sign JWT: {}", e)))?;

    tracing::debug!(token_uri = %key.token_uri, "Requesting service account token");

    let response = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await
        .map_err(|e| TranscriberError::Auth(format!("token endpoint unreachable: {}", e)))?;

    read_token_response(response, now).await
}

async fn fetch_metadata_token(client: &Client, url: &str) -> Result<CachedToken, TranscriberError> {
    let now = now_secs();
    let response = client
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| TranscriberError::Auth(format!("metadata server unreachable: {}", e)))?;

    read_token_response(response, now).await
}

async fn read_token_response(
    response: reqwest::Response,
    issued_at: u64,
) -> Result<CachedToken, TranscriberError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TranscriberError::Auth(format!(
            "token endpoint returned HTTP {}: {}",
            status,
            body.trim()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| TranscriberError::Auth(format!("invalid token response: {}", e)))?;

    Ok(CachedToken {
        access_token: token.access_token,
        expires_at: issued_at + token.expires_in,
    })
}
