//! Environment variable secrets provider

use async_trait::async_trait;
use std::env;

use crate::{Provider, SecretRef, SecretsError};

pub(crate) const DEFAULT_PREFIX: &str = "APM_SECRET_";

/// Reads `<prefix><VAULT>_<NAME>` with dashes and dots mapped to underscores.
pub struct EnvProvider {
    prefix: String,
}

impl EnvProvider {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn env_key(&self, secret: &SecretRef) -> String {
        format!(
            "{}{}_{}",
            self.prefix,
            normalize(&secret.vault),
            normalize(&secret.name)
        )
    }
}

fn normalize(part: &str) -> String {
    part.to_uppercase().replace(['-', '.'], "_")
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for EnvProvider {
    async fn get(&self, secret: &SecretRef) -> Result<String, SecretsError> {
        env::var(self.env_key(secret)).map_err(|_| SecretsError::NotFound(secret.to_string()))
    }

    async fn set(&self, _secret: &SecretRef, _value: &str) -> Result<(), SecretsError> {
        Err(SecretsError::ProviderError(
            "Cannot set environment variables at runtime".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "env"
    }
}
