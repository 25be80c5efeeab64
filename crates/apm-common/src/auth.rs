//! Bearer token providers
//!
//! Credential acquisition sits outside the reconciliation engine: the engine only
//! asks a [`TokenProvider`] for a bearer token before each request. Two providers exist:
//!
//! - [`StaticToken`]: a pre-acquired token (e.g. from `az account get-access-token`)
//! - [`ClientCredentials`]: OAuth2 client credentials grant against the Microsoft
//!   identity platform with in-memory caching and refresh

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Scope for Microsoft Graph application permissions.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Scope for Azure Key Vault data-plane access.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed with status {status}: {body}")]
    TokenRequest { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Supplies bearer tokens for outbound requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token.
    async fn token(&self) -> Result<String, AuthError>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// A token acquired outside this process.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// Token response from the OAuth2 token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Token request for client credentials grant
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

/// Cached token with expiration tracking
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Check if the token is still valid (with 60-second buffer)
    fn is_valid(&self) -> bool {
        self.expires_at > Instant::now() + Duration::from_secs(60)
    }
}

/// OAuth2 client credentials flow for a single scope.
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token_url: String,
    scope: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ClientCredentials {
    /// Create a provider for `scope` in the given tenant.
    ///
    /// `login_url` is the authority base, e.g. `https://login.microsoftonline.com`.
    pub fn new(
        login_url: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_url.trim_end_matches('/'),
                tenant_id
            ),
            scope: scope.into(),
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// The token endpoint this provider talks to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Fetch a new token from the token endpoint
    async fn fetch_token(&self) -> Result<TokenResponse, AuthError> {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            scope: &self.scope,
        };

        debug!(scope = %self.scope, "Requesting access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequest { status, body });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(ref token) = *cached {
                if token.is_valid() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(ref token) = *cached {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = self.fetch_token().await?;
        let expires_in = new_token.expires_in.unwrap_or(3600);

        *cached = Some(CachedToken {
            access_token: new_token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });

        Ok(new_token.access_token)
    }

    async fn invalidate(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }
}
