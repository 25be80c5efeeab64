//! Configuration loader with file and environment variable support

use crate::{ConfigError, Settings};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &["apm.toml", "./config/apm.toml", "/etc/apm/config.toml"];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load settings from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            settings = Settings::from_file(&path)?;
        }

        apply_overrides(&mut settings, |key| env::var(key).ok());
        settings.validate()?;

        Ok(settings)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("APM_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `APM_*` / `AZURE_*` overrides read through `lookup`.
///
/// Unparseable numeric values are ignored.
pub(crate) fn apply_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Graph
    if let Some(val) = lookup("APM_GRAPH_URL") {
        settings.graph.url = val;
    }
    if let Some(timeout) = lookup("APM_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.graph.timeout_secs = timeout;
    }

    // Auth
    if let Some(val) = lookup("APM_LOGIN_URL") {
        settings.auth.login_url = val;
    }
    if let Some(val) = lookup("AZURE_TENANT_ID") {
        settings.auth.tenant_id = Some(val);
    }
    if let Some(val) = lookup("AZURE_CLIENT_ID") {
        settings.auth.client_id = Some(val);
    }
    if let Some(val) = lookup("AZURE_CLIENT_SECRET") {
        settings.auth.client_secret = Some(val);
    }
    if let Some(val) = lookup("APM_GRAPH_TOKEN") {
        settings.auth.graph_token = Some(val);
    }
    if let Some(val) = lookup("APM_KEY_VAULT_TOKEN") {
        settings.auth.key_vault_token = Some(val);
    }

    // Secrets
    if let Some(val) = lookup("APM_SECRETS_PROVIDER") {
        settings.secrets.provider = val;
    }
    if let Some(val) = lookup("APM_KEY_VAULT_SUFFIX") {
        settings.secrets.key_vault_suffix = val;
    }

    // Reconcile
    if let Some(attempts) = lookup("APM_WAIT_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
        settings.reconcile.wait_max_attempts = attempts;
    }
    if let Some(interval) = lookup("APM_WAIT_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        settings.reconcile.wait_interval_secs = interval;
    }
    if let Some(days) = lookup("APM_SIGNING_MIN_VALIDITY_DAYS").and_then(|v| v.parse().ok()) {
        settings.reconcile.signing_min_validity_days = days;
    }
    if let Some(days) = lookup("APM_SIGNING_VALIDITY_DAYS").and_then(|v| v.parse().ok()) {
        settings.reconcile.signing_validity_days = days;
    }
    if let Some(days) = lookup("APM_PASSWORD_MIN_VALIDITY_DAYS").and_then(|v| v.parse().ok()) {
        settings.reconcile.password_min_validity_days = days;
    }
}
