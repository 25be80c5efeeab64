//! Group-assignment reconciler
//!
//! Ensures a security group holds a role on a service principal without ever
//! creating a duplicate assignment. Existing assignments are read page by page
//! until the continuation link runs out before absence is concluded.

use apm_graph::{AppRoleAssignment, Directory, NewAppRoleAssignment};
use futures::stream::{self, Stream, TryStreamExt};
use std::pin::pin;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ReconcileError, Result};

/// Upper bound on assignment pages read for one group.
pub const MAX_ASSIGNMENT_PAGES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Created,
    AlreadyAssigned,
}

/// Resolve a group display name to the id of the single security group bearing it.
pub async fn resolve_group_id(directory: &dyn Directory, name: &str) -> Result<String> {
    let mut groups = directory.find_security_groups(name).await?;
    match groups.len() {
        0 => Err(ReconcileError::GroupNotFound(name.to_string())),
        1 => Ok(groups.remove(0).id),
        count => Err(ReconcileError::AmbiguousGroup {
            name: name.to_string(),
            count,
        }),
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

async fn next_page(
    directory: &dyn Directory,
    group_id: &str,
    resource_id: &str,
    max_pages: usize,
    cursor: Cursor,
    fetched: usize,
) -> Result<Option<(Vec<AppRoleAssignment>, (Cursor, usize))>> {
    let continuation = match cursor {
        Cursor::Start => None,
        Cursor::Next(link) => Some(link),
        Cursor::Done => return Ok(None),
    };

    if fetched >= max_pages {
        return Err(ReconcileError::PaginationLimit {
            group_id: group_id.to_string(),
            limit: max_pages,
        });
    }

    let page = directory
        .list_group_assignments(group_id, resource_id, continuation.as_deref())
        .await?;
    let next = match page.next_link {
        Some(link) => Cursor::Next(link),
        None => Cursor::Done,
    };

    Ok(Some((page.value, (next, fetched + 1))))
}

/// Lazy sequence of assignment pages for `group_id` on `resource_id`.
///
/// Ends when a page carries no continuation link. Fails with
/// [`ReconcileError::PaginationLimit`] instead of reading page `max_pages + 1`.
pub fn assignment_pages<'a>(
    directory: &'a dyn Directory,
    group_id: &'a str,
    resource_id: &'a str,
    max_pages: usize,
) -> impl Stream<Item = Result<Vec<AppRoleAssignment>>> + 'a {
    stream::try_unfold((Cursor::Start, 0usize), move |(cursor, fetched)| {
        next_page(directory, group_id, resource_id, max_pages, cursor, fetched)
    })
}

/// Whether `group_id` already holds `role_id` on `resource_id`.
pub async fn assignment_exists(
    directory: &dyn Directory,
    group_id: &str,
    resource_id: &str,
    role_id: Uuid,
) -> Result<bool> {
    let mut pages = pin!(assignment_pages(
        directory,
        group_id,
        resource_id,
        MAX_ASSIGNMENT_PAGES
    ));

    while let Some(page) = pages.try_next().await? {
        if page
            .iter()
            .any(|a| a.app_role_id == role_id && a.resource_id == resource_id)
        {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Idempotently grant `role_id` on `resource_id` to `group_id`.
pub async fn ensure_assigned(
    directory: &dyn Directory,
    group_id: &str,
    resource_id: &str,
    role_id: Uuid,
) -> Result<AssignmentOutcome> {
    if assignment_exists(directory, group_id, resource_id, role_id).await? {
        debug!(group_id, %role_id, "Group role assignment already exists, skipping");
        return Ok(AssignmentOutcome::AlreadyAssigned);
    }

    directory
        .create_group_assignment(&NewAppRoleAssignment::for_group(
            group_id,
            resource_id,
            role_id,
        ))
        .await?;

    info!(group_id, %role_id, "Added group role assignment");
    Ok(AssignmentOutcome::Created)
}

/// [`ensure_assigned`] for a group given by display name.
pub async fn ensure_group_assigned(
    directory: &dyn Directory,
    group_name: &str,
    resource_id: &str,
    role_id: Uuid,
) -> Result<AssignmentOutcome> {
    let group_id = resolve_group_id(directory, group_name).await?;
    let outcome = ensure_assigned(directory, &group_id, resource_id, role_id).await?;
    if outcome == AssignmentOutcome::AlreadyAssigned {
        info!(group = group_name, "Group already assigned");
    }
    Ok(outcome)
}
