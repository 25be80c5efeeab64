//! Client secret rotation
//!
//! A password credential is identified by its display name. When none with the
//! declared name outlives the validity threshold, a new one is added and its
//! value stored in the secret store under that name.

use apm_config::SecretLocation;
use apm_graph::{Directory, GraphError, PasswordCredential};
use apm_secrets::{Provider, SecretRef};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOutcome {
    Kept,
    Rotated,
}

/// `true` when some credential named `name` is valid past `now + min_validity`.
pub fn has_valid_password(
    credentials: &[PasswordCredential],
    name: &str,
    now: DateTime<Utc>,
    min_validity: Duration,
) -> bool {
    let threshold = now + min_validity;
    credentials.iter().any(|credential| {
        credential.display_name.as_deref() == Some(name)
            && credential.end_date_time.is_some_and(|end| end > threshold)
    })
}

/// Add a password credential named after the secret unless one stays valid
/// beyond `now + min_validity`, then store its text in the secret store.
///
/// An application with no password credentials at all gets one too, so a
/// freshly created application is bootstrapped on its first run.
pub async fn ensure_client_secret(
    directory: &dyn Directory,
    secrets: &dyn Provider,
    application_id: &str,
    location: &SecretLocation,
    min_validity: Duration,
    now: DateTime<Utc>,
) -> Result<SecretOutcome> {
    let application = directory.get_application(application_id).await?;

    if has_valid_password(
        &application.password_credentials,
        &location.name,
        now,
        min_validity,
    ) {
        return Ok(SecretOutcome::Kept);
    }

    let credential = directory
        .add_password(application_id, &location.name)
        .await?;
    let secret_text = credential.secret_text.ok_or_else(|| {
        GraphError::UnexpectedResponse("addPassword returned no secretText".to_string())
    })?;

    let secret = SecretRef::new(&location.key_vault_name, &location.name);
    secrets.set(&secret, &secret_text).await?;

    info!(secret = %secret, "Rotated client secret");
    Ok(SecretOutcome::Rotated)
}
