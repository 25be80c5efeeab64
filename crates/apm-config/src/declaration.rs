//! Declarative application file
//!
//! ```yaml
//! apps:
//!   - name: contoso-app
//!     externalUrl: https://contoso-app.msappproxy.net/
//!     internalUrl: http://contoso.internal/
//!     appRoleAssignments: [App Users]
//!     tls:
//!       key_vault_name: kv-prod
//!       name: contoso-tls
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::ConfigError;

/// Id of the baseline "User" role that is always present on reconciled apps.
pub const RESERVED_ROLE_ID: Uuid = Uuid::from_u128(0x18d14569_c3bd_439b_9a66_3a2aee01d14f);

/// Root of the declaration file
#[derive(Debug, Clone, Deserialize)]
pub struct Declarations {
    pub apps: Vec<AppDeclaration>,
}

/// Desired state of one application
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDeclaration {
    pub name: String,
    pub external_url: String,
    pub internal_url: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Absent means `[externalUrl]`; see [`AppDeclaration::redirect_urls`].
    #[serde(default, rename = "redirectUrls")]
    redirect_urls: Option<Vec<String>>,
    #[serde(default)]
    pub identifier_urls: Vec<String>,
    #[serde(default = "default_true")]
    pub user_assignment_required: bool,
    /// Groups granted the service principal's default role
    #[serde(default)]
    pub app_role_assignments: Vec<String>,
    #[serde(default)]
    pub preferred_single_sign_on_mode: Option<String>,
    #[serde(default)]
    pub tls: Option<SecretLocation>,
    #[serde(default)]
    pub client_secret: Option<SecretLocation>,
    #[serde(default)]
    pub graph_api_permissions: Vec<String>,
    #[serde(default)]
    pub app_roles: Option<Vec<AppRoleDeclaration>>,
    #[serde(default)]
    pub optional_claims: Option<Vec<OptionalClaim>>,
    #[serde(default)]
    pub group_membership_claims: Option<String>,
    #[serde(default)]
    pub hide_app: bool,
}

fn default_true() -> bool {
    true
}

/// Secret store location (`key_vault_name` + secret `name`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretLocation {
    pub key_vault_name: String,
    pub name: String,
}

/// App role with the groups that should hold it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleDeclaration {
    pub id: Uuid,
    pub value: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// SAML token optional claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalClaim {
    pub name: String,
    #[serde(default)]
    pub additional_properties: Vec<String>,
}

impl AppDeclaration {
    /// Declared redirect URLs, defaulting to the external URL.
    pub fn redirect_urls(&self) -> Vec<String> {
        match &self.redirect_urls {
            Some(urls) => urls.clone(),
            None => vec![self.external_url.clone()],
        }
    }

    pub fn is_saml(&self) -> bool {
        self.preferred_single_sign_on_mode.as_deref() == Some("saml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("application name must not be empty"));
        }

        let Some(roles) = &self.app_roles else {
            return Ok(());
        };

        let mut ids = HashSet::new();
        let mut values = HashSet::new();
        for role in roles {
            if role.id == RESERVED_ROLE_ID {
                return Err(invalid(format!(
                    "{}: role {} uses the reserved User role id",
                    self.name, role.value
                )));
            }
            if !ids.insert(role.id) {
                return Err(invalid(format!("{}: duplicate role id {}", self.name, role.id)));
            }
            if !values.insert(role.value.as_str()) {
                return Err(invalid(format!(
                    "{}: duplicate role value {}",
                    self.name, role.value
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

impl Declarations {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a declaration document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let declarations: Declarations = serde_yaml::from_str(content)?;
        declarations.validate()?;
        Ok(declarations)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for app in &self.apps {
            app.validate()?;
            if !names.insert(app.name.as_str()) {
                return Err(invalid(format!("duplicate application name {}", app.name)));
            }
        }
        Ok(())
    }
}
