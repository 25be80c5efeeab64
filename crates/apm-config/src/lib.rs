//! App Proxy Manager Configuration
//!
//! Two inputs:
//! - runtime settings: TOML file with environment variable overrides ([`Settings`])
//! - application declarations: YAML file listing the apps to reconcile ([`Declarations`])

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod declaration;
mod loader;

pub use declaration::{
    AppDeclaration, AppRoleDeclaration, Declarations, OptionalClaim, SecretLocation,
    RESERVED_ROLE_ID,
};
pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root runtime settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphSettings,
    pub auth: AuthSettings,
    pub secrets: SecretsSettings,
    pub reconcile: ReconcileSettings,
}

/// Microsoft Graph endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            url: "https://graph.microsoft.com".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Credentials for Graph and Key Vault.
///
/// Pre-acquired tokens take precedence over the client credentials grant.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub login_url: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub graph_token: Option<String>,
    pub key_vault_token: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_url: "https://login.microsoftonline.com".to_string(),
            tenant_id: None,
            client_id: None,
            client_secret: None,
            graph_token: None,
            key_vault_token: None,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("login_url", &self.login_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("graph_token", &self.graph_token.as_ref().map(|_| "***"))
            .field("key_vault_token", &self.key_vault_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Secret store selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    /// `keyvault` or `env`
    pub provider: String,
    pub key_vault_suffix: String,
    pub env_prefix: String,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            provider: "keyvault".to_string(),
            key_vault_suffix: "vault.azure.net".to_string(),
            env_prefix: "APM_SECRET_".to_string(),
        }
    }
}

/// Reconciliation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Visibility polls after creating an application
    pub wait_max_attempts: u32,
    pub wait_interval_secs: u64,
    /// A signing certificate must outlive now + this many days to be kept
    pub signing_min_validity_days: i64,
    /// Lifetime of newly created signing certificates
    pub signing_validity_days: i64,
    /// A client secret must outlive now + this many days to be kept
    pub password_min_validity_days: i64,
}

/// Upper bound for every `*_days` setting (ten years).
pub const MAX_VALIDITY_DAYS: i64 = 3650;

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            wait_max_attempts: 30,
            wait_interval_secs: 2,
            signing_min_validity_days: 10,
            signing_validity_days: 365,
            password_min_validity_days: 10,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings with environment variable overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile.wait_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "reconcile.wait_max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, days) in [
            ("signing_min_validity_days", self.reconcile.signing_min_validity_days),
            ("signing_validity_days", self.reconcile.signing_validity_days),
            ("password_min_validity_days", self.reconcile.password_min_validity_days),
        ] {
            if !(0..=MAX_VALIDITY_DAYS).contains(&days) {
                return Err(ConfigError::ValidationError(format!(
                    "reconcile.{} must be between 0 and {}, got {}",
                    name, MAX_VALIDITY_DAYS, days
                )));
            }
        }
        if self.reconcile.signing_validity_days <= self.reconcile.signing_min_validity_days {
            return Err(ConfigError::ValidationError(
                "reconcile.signing_validity_days must exceed signing_min_validity_days"
                    .to_string(),
            ));
        }
        match self.secrets.provider.as_str() {
            "keyvault" | "env" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "unknown secrets provider: {}",
                other
            ))),
        }
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# App Proxy Manager Configuration
# Environment variables override these settings

[graph]
url = "https://graph.microsoft.com"
timeout_secs = 30

[auth]
login_url = "https://login.microsoftonline.com"
# tenant_id, client_id and client_secret enable the client credentials grant
# graph_token and key_vault_token accept pre-acquired bearer tokens

[secrets]
provider = "keyvault"  # keyvault or env
key_vault_suffix = "vault.azure.net"
env_prefix = "APM_SECRET_"

[reconcile]
wait_max_attempts = 30
wait_interval_secs = 2
signing_min_validity_days = 10
signing_validity_days = 365
password_min_validity_days = 10
"#
        .to_string()
    }
}
