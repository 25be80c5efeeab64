//! Resource-access merger
//!
//! Maintains the `requiredResourceAccess` entry of one resource (Microsoft Graph)
//! while leaving entries for every other resource untouched.

use apm_graph::{
    AccessType, ApiVersion, Directory, PermissionCatalog, RequiredResourceAccess, ResourceAccess,
};
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::Result;

/// Resolve permission names against a catalog snapshot.
///
/// Application permissions (app roles) match exactly, delegated permissions
/// (OAuth2 scopes) match case-insensitively. A name published as both yields
/// both entries. Names found in neither are skipped with a warning.
pub fn resolve_permissions(catalog: &PermissionCatalog, names: &[String]) -> Vec<ResourceAccess> {
    let mut resolved = Vec::new();
    let mut seen = HashSet::new();

    let mut push = |access: ResourceAccess| {
        if seen.insert(access.clone()) {
            resolved.push(access);
        }
    };

    for name in names {
        let mut matched = false;

        if let Some(role) = catalog
            .app_roles
            .iter()
            .find(|role| role.value.as_deref() == Some(name.as_str()))
        {
            push(ResourceAccess {
                id: role.id,
                access_type: AccessType::Role,
            });
            matched = true;
        }

        if let Some(scope) = catalog.oauth2_permission_scopes.iter().find(|scope| {
            scope
                .value
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(name))
        }) {
            push(ResourceAccess {
                id: scope.id,
                access_type: AccessType::Scope,
            });
            matched = true;
        }

        if !matched {
            warn!(permission = %name, "Permission not published by resource, skipping");
        }
    }

    resolved
}

/// Replace the access list of `target_resource_app_id`, or append an entry for it.
///
/// Only the first matching entry is replaced. An empty `desired` list leaves
/// `current` unchanged: permissions are never cleared by this merger.
pub fn merge(
    mut current: Vec<RequiredResourceAccess>,
    target_resource_app_id: &str,
    desired: Vec<ResourceAccess>,
) -> Vec<RequiredResourceAccess> {
    if desired.is_empty() {
        return current;
    }

    match current
        .iter_mut()
        .find(|entry| entry.resource_app_id == target_resource_app_id)
    {
        Some(entry) => entry.resource_access = desired,
        None => current.push(RequiredResourceAccess {
            resource_app_id: target_resource_app_id.to_string(),
            resource_access: desired,
        }),
    }

    current
}

/// Converge the application's permissions on `resource_app_id` to `names`.
///
/// Returns `true` when a PATCH was issued.
pub async fn reconcile_resource_access(
    directory: &dyn Directory,
    application_id: &str,
    resource_app_id: &str,
    names: &[String],
) -> Result<bool> {
    if names.is_empty() {
        info!("No graph api permissions to grant");
        return Ok(false);
    }

    let catalog = directory.permission_catalog(resource_app_id).await?;
    let desired = resolve_permissions(&catalog, names);

    let application = directory.get_application(application_id).await?;
    let current = application.required_resource_access;
    let merged = merge(current.clone(), resource_app_id, desired);

    if merged == current {
        info!("Graph api permissions already up to date");
        return Ok(false);
    }

    directory
        .patch_application(
            application_id,
            ApiVersion::V1,
            "granting graph api permissions",
            &json!({ "requiredResourceAccess": merged }),
        )
        .await?;

    info!(entries = merged.len(), "Granted graph api permissions");
    Ok(true)
}
