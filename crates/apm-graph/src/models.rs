//! Microsoft Graph entity shapes used by the reconciler.
//!
//! Only the attributes the reconciler reads or writes are modelled; everything
//! else is ignored on deserialization. Graph returns `null` for some empty
//! collections, so list attributes deserialize `null` as an empty list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Well-known application id of the Microsoft Graph resource.
pub const MICROSOFT_GRAPH_APP_ID: &str = "00000003-0000-0000-c000-000000000000";

/// Graph API version segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    Beta,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1.0",
            ApiVersion::Beta => "beta",
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of an OData collection response.
#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Opaque continuation link; absent on the last page.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Bare object reference (`$select=id` queries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

// ============================================================================
// Applications
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Object id (the `applicationId` of the reconciler).
    pub id: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub publisher_domain: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub identifier_uris: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub group_membership_claims: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub required_resource_access: Vec<RequiredResourceAccess>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_roles: Vec<AppRole>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password_credentials: Vec<PasswordCredential>,
}

/// Permissions an application requests from one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    pub resource_app_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resource_access: Vec<ResourceAccess>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Application permission (app role of the resource).
    Role,
    /// Delegated permission (OAuth2 permission scope of the resource).
    Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub access_type: AccessType,
}

/// App role definition on an application or service principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    pub id: Uuid,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allowed_member_types: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub is_enabled: bool,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredential {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<DateTime<Utc>>,
    /// Only populated in the response of `addPassword`.
    #[serde(default)]
    pub secret_text: Option<String>,
}

/// Result of instantiating the custom (non-gallery) application template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTemplateInstance {
    pub application: ObjectRef,
    pub service_principal: ObjectRef,
}

/// App proxy publishing settings (beta `onPremisesPublishing`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnPremisesPublishing {
    pub external_url: String,
    pub internal_url: String,
    pub external_authentication_type: String,
    pub is_http_only_cookie_enabled: bool,
    pub is_on_prem_publishing_enabled: bool,
    pub is_persistent_cookie_enabled: bool,
    pub is_secure_cookie_enabled: bool,
    pub is_translate_host_header_enabled: bool,
    pub is_translate_links_in_body_enabled: bool,
}

impl OnPremisesPublishing {
    /// Publishing with Entra pre-authentication and hardened cookies.
    pub fn pre_authenticated(external_url: &str, internal_url: &str) -> Self {
        Self {
            external_url: external_url.to_string(),
            internal_url: internal_url.to_string(),
            external_authentication_type: "aadPreAuthentication".to_string(),
            is_http_only_cookie_enabled: true,
            is_on_prem_publishing_enabled: true,
            is_persistent_cookie_enabled: true,
            is_secure_cookie_enabled: true,
            is_translate_host_header_enabled: true,
            is_translate_links_in_body_enabled: false,
        }
    }
}

// ============================================================================
// Service principals
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    pub id: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub app_role_assignment_required: Option<bool>,
    #[serde(default)]
    pub preferred_single_sign_on_mode: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_credentials: Vec<KeyCredential>,
    #[serde(default)]
    pub preferred_token_signing_key_thumbprint: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_roles: Vec<AppRole>,
}

/// Certificate credential on a service principal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCredential {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub custom_key_identifier: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default, rename = "type")]
    pub key_type: Option<String>,
}

/// Response of `addTokenSigningCertificate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningCertificate {
    pub thumbprint: String,
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<DateTime<Utc>>,
}

/// Published role and scope catalog of a resource service principal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCatalog {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_roles: Vec<CatalogEntry>,
    #[serde(
        default,
        rename = "oauth2PermissionScopes",
        deserialize_with = "null_as_empty"
    )]
    pub oauth2_permission_scopes: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    #[serde(default)]
    pub value: Option<String>,
}

// ============================================================================
// Groups and assignments
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub security_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleAssignment {
    #[serde(default)]
    pub id: Option<String>,
    pub app_role_id: Uuid,
    pub principal_id: String,
    pub resource_id: String,
    #[serde(default)]
    pub principal_type: Option<String>,
    #[serde(default)]
    pub resource_display_name: Option<String>,
}

/// Body of an app role assignment create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppRoleAssignment {
    pub principal_id: String,
    pub resource_id: String,
    pub app_role_id: Uuid,
}

impl NewAppRoleAssignment {
    /// Assignment of `app_role_id` on `resource_id` to a group.
    pub fn for_group(group_id: &str, resource_id: &str, app_role_id: Uuid) -> Self {
        Self {
            principal_id: group_id.to_string(),
            resource_id: resource_id.to_string(),
            app_role_id,
        }
    }
}
