//! Azure Key Vault secrets provider
//!
//! Talks to the Key Vault data plane REST API:
//! - `GET  {vault_url}/secrets/{name}?api-version=7.4`
//! - `PUT  {vault_url}/secrets/{name}?api-version=7.4` with `{"value": ...}`
//!
//! `vault_url` is `https://{vault}.{suffix}` unless an endpoint override is set.

use apm_common::TokenProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{Provider, SecretRef, SecretsError};

pub const DEFAULT_KEY_VAULT_SUFFIX: &str = "vault.azure.net";
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// Azure Key Vault secret provider
pub struct KeyVaultProvider {
    client: Client,
    suffix: String,
    endpoint: Option<String>,
    tokens: Arc<dyn TokenProvider>,
}

impl KeyVaultProvider {
    /// Create a provider for vaults under `suffix` (e.g. `vault.azure.net`).
    pub fn new(suffix: &str, tokens: Arc<dyn TokenProvider>, client: Client) -> Self {
        info!(suffix = %suffix, "Initialized Azure Key Vault provider");
        Self {
            client,
            suffix: suffix.trim_matches('.').to_string(),
            endpoint: None,
            tokens,
        }
    }

    /// Send every request to `endpoint` regardless of vault name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    pub fn vault_url(&self, vault: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.{}", vault, self.suffix),
        }
    }

    fn secret_url(&self, secret: &SecretRef) -> Result<String, SecretsError> {
        validate_name(&secret.vault)?;
        validate_name(&secret.name)?;
        Ok(format!(
            "{}/secrets/{}",
            self.vault_url(&secret.vault),
            secret.name
        ))
    }
}

/// Vault and secret names are restricted to ASCII alphanumerics and dashes.
fn validate_name(name: &str) -> Result<(), SecretsError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(())
    } else {
        Err(SecretsError::InvalidKey(name.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

#[derive(Debug, Serialize)]
struct SetSecretRequest<'a> {
    value: &'a str,
}

async fn provider_error(secret: &SecretRef, response: reqwest::Response) -> SecretsError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SecretsError::ProviderError(format!(
        "Key Vault returned error {} for {}: {}",
        status, secret, body
    ))
}

#[async_trait]
impl Provider for KeyVaultProvider {
    async fn get(&self, secret: &SecretRef) -> Result<String, SecretsError> {
        let url = self.secret_url(secret)?;
        debug!(url = %url, "Reading secret from Key Vault");

        let token = self.tokens.token().await?;
        let response = self
            .client
            .get(&url)
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SecretsError::NotFound(secret.to_string()));
        }
        if !response.status().is_success() {
            return Err(provider_error(secret, response).await);
        }

        let bundle: SecretBundle = response.json().await?;
        Ok(bundle.value)
    }

    async fn set(&self, secret: &SecretRef, value: &str) -> Result<(), SecretsError> {
        let url = self.secret_url(secret)?;
        debug!(url = %url, "Writing secret to Key Vault");

        let token = self.tokens.token().await?;
        let response = self
            .client
            .put(&url)
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(token)
            .json(&SetSecretRequest { value })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(secret, response).await);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "keyvault"
    }
}
