//! Eventual-consistency waiter
//!
//! Graph acknowledges a create before the new object can be read back. After
//! creating an application we poll it until a read succeeds.

use apm_graph::{Directory, Visibility};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ReconcileError, Result};

/// Fixed-interval polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// Poll until `application_id` is readable. Returns the number of reads made.
///
/// 404 is the expected transient state. Any other failure is logged and counts
/// as an unsuccessful attempt.
pub async fn wait_until_visible(
    directory: &dyn Directory,
    application_id: &str,
    policy: &WaitPolicy,
) -> Result<u32> {
    for attempt in 1..=policy.max_attempts {
        match directory.application_visibility(application_id).await {
            Ok(Visibility::Visible) => {
                debug!(application_id, attempt, "Application is visible");
                return Ok(attempt);
            }
            Ok(Visibility::NotFound) => {
                debug!(application_id, attempt, "Waiting for application to be created");
            }
            Ok(Visibility::Failed { status, body }) => {
                warn!(
                    application_id,
                    attempt,
                    status,
                    body = %body.map(|b| b.to_string()).unwrap_or_default(),
                    "Unexpected error reading application"
                );
            }
            Err(e) => {
                warn!(application_id, attempt, error = %e, "Unexpected error reading application");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(ReconcileError::NeverVisible {
        object_id: application_id.to_string(),
        attempts: policy.max_attempts,
    })
}
