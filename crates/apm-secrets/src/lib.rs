//! Secret store access for the app proxy manager
//!
//! TLS certificates are read from, and rotated client secrets written to, a secret
//! store addressed by `(vault, name)`. Backends:
//! - Azure Key Vault (default)
//! - Environment variables (read-only, for local runs)

use apm_common::TokenProvider;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

mod env;
mod key_vault;

pub use env::EnvProvider;
pub use key_vault::{KeyVaultProvider, DEFAULT_KEY_VAULT_SUFFIX, KEY_VAULT_API_VERSION};

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: {0}")]
    NotFound(String),
    #[error("Invalid secret name: {0}")]
    InvalidKey(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Authentication error: {0}")]
    Auth(#[from] apm_common::AuthError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Location of a secret: vault name plus secret name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub vault: String,
    pub name: String,
}

impl SecretRef {
    pub fn new(vault: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vault, self.name)
    }
}

/// Configuration for secrets providers
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    /// `keyvault` or `env`
    pub provider: String,
    /// DNS suffix of the Key Vault data plane (`vault.azure.net` in the public cloud)
    pub key_vault_suffix: String,
    /// Prefix for the environment provider
    pub env_prefix: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: "keyvault".to_string(),
            key_vault_suffix: DEFAULT_KEY_VAULT_SUFFIX.to_string(),
            env_prefix: env::DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Secrets provider trait
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the current value of a secret
    async fn get(&self, secret: &SecretRef) -> Result<String, SecretsError>;

    /// Create or overwrite a secret
    async fn set(&self, secret: &SecretRef, value: &str) -> Result<(), SecretsError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Create a provider based on configuration.
///
/// `tokens` must yield Key Vault scoped tokens; it is unused by the env provider.
pub fn create_provider(
    config: &SecretsConfig,
    tokens: Arc<dyn TokenProvider>,
    http_client: reqwest::Client,
) -> Result<Arc<dyn Provider>, SecretsError> {
    match config.provider.as_str() {
        "keyvault" => {
            info!(suffix = %config.key_vault_suffix, "Using Azure Key Vault secrets provider");
            Ok(Arc::new(KeyVaultProvider::new(
                &config.key_vault_suffix,
                tokens,
                http_client,
            )))
        }
        "env" => {
            info!(prefix = %config.env_prefix, "Using environment variable secrets provider");
            Ok(Arc::new(EnvProvider::with_prefix(&config.env_prefix)))
        }
        other => Err(SecretsError::ProviderError(format!(
            "Unknown provider: {}",
            other
        ))),
    }
}
