//! Single-PATCH configuration steps applied to every reconciled application.

use apm_config::{AppDeclaration, SecretLocation};
use apm_graph::{ApiVersion, Directory, OnPremisesPublishing};
use apm_secrets::{Provider, SecretRef};
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::info;

use crate::assignments::ensure_group_assigned;
use crate::error::{ReconcileError, Result};
use crate::pfx::{repackage, PLACEHOLDER_PASSWORD};
use crate::signing::{ensure_signing_certificate, SigningOutcome, SigningPolicy};

/// Identifier URIs, redirect URIs, home page and visibility tag.
pub async fn update_application_config(
    directory: &dyn Directory,
    application_id: &str,
    app: &AppDeclaration,
) -> Result<()> {
    let tags: Vec<&str> = if app.hide_app { vec!["HideApp"] } else { vec![] };
    directory
        .patch_application(
            application_id,
            ApiVersion::V1,
            "updating application config",
            &json!({
                "identifierUris": app.identifier_urls,
                "web": {
                    "redirectUris": app.redirect_urls(),
                    "homePageUrl": app.external_url,
                },
                "tags": tags,
            }),
        )
        .await?;
    Ok(())
}

/// Download the logo at `logo_url` and upload it to the application.
pub async fn set_logo(
    directory: &dyn Directory,
    http_client: &reqwest::Client,
    application_id: &str,
    logo_url: &str,
) -> Result<()> {
    let download_error = |e: reqwest::Error| ReconcileError::LogoDownload {
        url: logo_url.to_string(),
        message: e.to_string(),
    };

    let response = http_client
        .get(logo_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(download_error)?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("image/png")
        .to_string();
    let bytes = response.bytes().await.map_err(download_error)?;

    directory
        .upload_logo(application_id, &content_type, bytes.to_vec())
        .await?;
    info!(%content_type, size = bytes.len(), "Set logo");
    Ok(())
}

pub async fn set_on_premises_publishing(
    directory: &dyn Directory,
    application_id: &str,
    app: &AppDeclaration,
) -> Result<()> {
    let publishing = OnPremisesPublishing::pre_authenticated(&app.external_url, &app.internal_url);
    directory
        .patch_application(
            application_id,
            ApiVersion::Beta,
            "setting onPremisesPublishing",
            &json!({ "onPremisesPublishing": publishing }),
        )
        .await?;
    Ok(())
}

pub async fn set_user_assignment_required(
    directory: &dyn Directory,
    service_principal_id: &str,
    required: bool,
) -> Result<()> {
    directory
        .patch_service_principal(
            service_principal_id,
            "updating servicePrincipal config",
            &json!({ "appRoleAssignmentRequired": required }),
        )
        .await?;
    Ok(())
}

/// Grant each group the first role the service principal publishes.
pub async fn assign_default_groups(
    directory: &dyn Directory,
    service_principal_id: &str,
    groups: &[String],
) -> Result<()> {
    if groups.is_empty() {
        return Ok(());
    }

    let roles = directory.service_principal_app_roles(service_principal_id).await?;
    let role_id = roles
        .first()
        .map(|role| role.id)
        .ok_or_else(|| ReconcileError::NoDefaultRole(service_principal_id.to_string()))?;

    for group in groups {
        ensure_group_assigned(directory, group, service_principal_id, role_id).await?;
    }
    Ok(())
}

/// Upload the custom-domain TLS certificate held in the secret store.
pub async fn set_tls_certificate(
    directory: &dyn Directory,
    secrets: &dyn Provider,
    application_id: &str,
    tls: &SecretLocation,
) -> Result<()> {
    let secret = SecretRef::new(&tls.key_vault_name, &tls.name);
    let pfx = secrets.get(&secret).await?;
    let value = repackage(&pfx, PLACEHOLDER_PASSWORD, &tls.name)?;

    directory
        .patch_application(
            application_id,
            ApiVersion::Beta,
            "setting tls certificate",
            &json!({
                "onPremisesPublishing": {
                    "verifiedCustomDomainKeyCredential": {
                        "type": "X509CertAndPassword",
                        "value": value,
                    },
                    "verifiedCustomDomainPasswordCredential": {
                        "value": PLACEHOLDER_PASSWORD,
                    },
                },
            }),
        )
        .await?;
    info!(secret = %secret, "Set tls certificate");
    Ok(())
}

/// Switch the service principal to SAML and make sure it can sign.
pub async fn enable_saml(
    directory: &dyn Directory,
    service_principal_id: &str,
    display_name: &str,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<SigningOutcome> {
    directory
        .patch_service_principal(
            service_principal_id,
            "enabling saml config",
            &json!({ "preferredSingleSignOnMode": "saml" }),
        )
        .await?;

    ensure_signing_certificate(directory, service_principal_id, display_name, policy, now).await
}

/// Group membership and SAML optional claims. Skipped when neither is declared.
pub async fn set_optional_claims(
    directory: &dyn Directory,
    application_id: &str,
    app: &AppDeclaration,
) -> Result<()> {
    if app.optional_claims.is_none() && app.group_membership_claims.is_none() {
        return Ok(());
    }

    let optional_claims = match &app.optional_claims {
        Some(claims) if !claims.is_empty() => json!({ "saml2Token": claims }),
        _ => json!({}),
    };

    directory
        .patch_application(
            application_id,
            ApiVersion::V1,
            "adding optional claims",
            &json!({
                "groupMembershipClaims": app.group_membership_claims,
                "optionalClaims": optional_claims,
            }),
        )
        .await?;
    Ok(())
}

/// Identifier and redirect URIs required by SAML sign-on.
pub async fn set_saml_uris(
    directory: &dyn Directory,
    application_id: &str,
    app: &AppDeclaration,
) -> Result<()> {
    directory
        .patch_application(
            application_id,
            ApiVersion::V1,
            "adding saml config",
            &json!({
                "identifierUris": app.identifier_urls,
                "web": { "redirectUris": app.redirect_urls() },
            }),
        )
        .await?;
    Ok(())
}
