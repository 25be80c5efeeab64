//! Find-or-create of the application / service principal pair
//!
//! The display name is the idempotency key. An existing application must come
//! with its service principal; a missing one signals outside interference and
//! is never repaired here.

use apm_graph::{Application, Directory};
use tracing::info;

use crate::error::{ReconcileError, Result};
use crate::waiter::{wait_until_visible, WaitPolicy};

/// Object ids of a reconciled application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationIds {
    pub application_id: String,
    pub service_principal_id: String,
}

/// Id of the application named `display_name`, if one exists.
pub async fn find_existing(directory: &dyn Directory, display_name: &str) -> Result<Option<String>> {
    let mut found = directory.find_applications(display_name).await?;
    match found.len() {
        0 => Ok(None),
        1 => Ok(Some(found.remove(0).id)),
        count => Err(ReconcileError::AmbiguousApplication {
            name: display_name.to_string(),
            count,
        }),
    }
}

async fn find_service_principal(directory: &dyn Directory, display_name: &str) -> Result<String> {
    let mut found = directory.find_service_principals(display_name).await?;
    match found.len() {
        0 => Err(ReconcileError::ServicePrincipalMissing {
            name: display_name.to_string(),
        }),
        1 => Ok(found.remove(0).id),
        count => Err(ReconcileError::AmbiguousServicePrincipal {
            name: display_name.to_string(),
            count,
        }),
    }
}

/// Resolve the application pair named `display_name`, creating it when absent.
///
/// The boolean is `true` when the pair was created by this call.
pub async fn find_or_create(
    directory: &dyn Directory,
    display_name: &str,
    wait: &WaitPolicy,
) -> Result<(ApplicationIds, bool)> {
    if let Some(application_id) = find_existing(directory, display_name).await? {
        info!(%application_id, "Found existing application");
        let service_principal_id = find_service_principal(directory, display_name).await?;
        return Ok((
            ApplicationIds {
                application_id,
                service_principal_id,
            },
            false,
        ));
    }

    info!("Creating application");
    let instance = directory.instantiate_application(display_name).await?;
    let attempts = wait_until_visible(directory, &instance.application.id, wait).await?;
    info!(application_id = %instance.application.id, attempts, "Created application");

    Ok((
        ApplicationIds {
            application_id: instance.application.id,
            service_principal_id: instance.service_principal.id,
        },
        true,
    ))
}

/// Applications whose display name starts with `prefix`.
pub async fn find_by_prefix(directory: &dyn Directory, prefix: &str) -> Result<Vec<Application>> {
    Ok(directory.find_applications_by_prefix(prefix).await?)
}

/// Delete the application named `display_name`. Returns its object id.
pub async fn delete_by_name(directory: &dyn Directory, display_name: &str) -> Result<String> {
    let application_id = find_existing(directory, display_name)
        .await?
        .ok_or_else(|| ReconcileError::ApplicationNotFound(display_name.to_string()))?;

    directory.delete_application(&application_id).await?;
    info!(%application_id, name = display_name, "Deleted application");
    Ok(application_id)
}
