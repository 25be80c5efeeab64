//! App-role lifecycle
//!
//! Graph refuses to delete or redefine an enabled role. Removing a role is
//! therefore a two-step transition: PATCH every stored role with
//! `isEnabled = false`, then PATCH the desired list with every role enabled.
//!
//! The disable step is only taken when some stored role (identified by id and
//! display name) is absent from the desired list. Additions and edits of
//! unchanged identities go straight to the replace step, so access enforcement
//! is never switched off needlessly.

use apm_config::{AppRoleDeclaration, RESERVED_ROLE_ID};
use apm_graph::{ApiVersion, AppRole, Directory};
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Broad "User" access role kept on every application so that group-wide
/// assignments made before any custom roles existed stay valid.
pub fn baseline_role() -> AppRole {
    AppRole {
        id: RESERVED_ROLE_ID,
        allowed_member_types: vec!["User".to_string()],
        description: Some("User".to_string()),
        display_name: Some("User".to_string()),
        is_enabled: true,
        value: Some(String::new()),
    }
}

/// Effective desired role list: the baseline role followed by the declared roles.
pub fn desired_roles(declared: &[AppRoleDeclaration]) -> Vec<AppRole> {
    std::iter::once(baseline_role())
        .chain(declared.iter().map(|role| AppRole {
            id: role.id,
            allowed_member_types: vec!["User".to_string()],
            description: Some(role.description.clone()),
            display_name: Some(role.display_name.clone()),
            is_enabled: true,
            value: Some(role.value.clone()),
        }))
        .collect()
}

fn identity(role: &AppRole) -> (Uuid, Option<&str>) {
    (role.id, role.display_name.as_deref())
}

/// `true` when some current role identity is missing from `desired`.
pub fn removes_roles(current: &[AppRole], desired: &[AppRole]) -> bool {
    let wanted: HashSet<_> = desired.iter().map(identity).collect();
    current.iter().any(|role| !wanted.contains(&identity(role)))
}

/// `current` with every role disabled and nothing else changed.
pub fn disable_all(current: &[AppRole]) -> Vec<AppRole> {
    current
        .iter()
        .cloned()
        .map(|role| AppRole {
            is_enabled: false,
            ..role
        })
        .collect()
}

/// PATCH sequence needed to move from the stored roles to the desired ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolePlan {
    /// Stored roles already equal the desired list.
    Unchanged,
    Replace {
        desired: Vec<AppRole>,
    },
    DisableThenReplace {
        disabled: Vec<AppRole>,
        desired: Vec<AppRole>,
    },
}

impl RolePlan {
    pub fn compute(current: &[AppRole], desired: Vec<AppRole>) -> Self {
        if current == desired.as_slice() {
            RolePlan::Unchanged
        } else if removes_roles(current, &desired) {
            RolePlan::DisableThenReplace {
                disabled: disable_all(current),
                desired,
            }
        } else {
            RolePlan::Replace { desired }
        }
    }
}

async fn patch_roles(directory: &dyn Directory, application_id: &str, roles: &[AppRole]) -> Result<()> {
    directory
        .patch_application(
            application_id,
            ApiVersion::V1,
            "updating application app roles",
            &json!({ "appRoles": roles }),
        )
        .await?;
    Ok(())
}

/// Converge the application's roles to the baseline role plus `declared`.
pub async fn reconcile_app_roles(
    directory: &dyn Directory,
    application_id: &str,
    declared: &[AppRoleDeclaration],
) -> Result<RolePlan> {
    let application = directory.get_application(application_id).await?;
    let plan = RolePlan::compute(&application.app_roles, desired_roles(declared));

    match &plan {
        RolePlan::Unchanged => {
            info!("App roles already up to date");
        }
        RolePlan::Replace { desired } => {
            patch_roles(directory, application_id, desired).await?;
            info!(roles = desired.len(), "Updated app roles");
        }
        RolePlan::DisableThenReplace { disabled, desired } => {
            patch_roles(directory, application_id, disabled).await?;
            info!("Temporarily disabled app roles to allow removal");
            patch_roles(directory, application_id, desired).await?;
            info!(roles = desired.len(), "Updated app roles");
        }
    }

    Ok(plan)
}
