//! SAML signing-certificate rotation
//!
//! Graph has no single "rotate and activate" call: a new self-signed
//! certificate is added first, then made preferred by thumbprint.

use apm_graph::{Directory, KeyCredential};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningPolicy {
    /// Certificates expiring before now + `min_validity` do not count.
    pub min_validity: Duration,
    /// Lifetime of a newly created certificate.
    pub validity: Duration,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            min_validity: Duration::days(10),
            validity: Duration::days(365),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
    Kept,
    Rotated { thumbprint: String },
}

/// `true` unless some credential stays valid past `now + min_validity`.
///
/// Credentials without an expiry never count as valid.
pub fn needs_new_certificate(
    credentials: &[KeyCredential],
    now: DateTime<Utc>,
    min_validity: Duration,
) -> bool {
    let threshold = now + min_validity;
    !credentials
        .iter()
        .filter_map(|credential| credential.end_date_time)
        .any(|end| end > threshold)
}

/// Ensure the service principal signs with a certificate that is not about to expire.
pub async fn ensure_signing_certificate(
    directory: &dyn Directory,
    service_principal_id: &str,
    subject_name: &str,
    policy: &SigningPolicy,
    now: DateTime<Utc>,
) -> Result<SigningOutcome> {
    let service_principal = directory.get_service_principal(service_principal_id).await?;

    if !needs_new_certificate(&service_principal.key_credentials, now, policy.min_validity) {
        info!(
            certificates = service_principal.key_credentials.len(),
            "Signing certificate still valid"
        );
        return Ok(SigningOutcome::Kept);
    }

    info!("Creating new signing certificate");
    let certificate = directory
        .add_token_signing_certificate(
            service_principal_id,
            &format!("CN={}", subject_name),
            now + policy.validity,
        )
        .await?;

    directory
        .patch_service_principal(
            service_principal_id,
            "making signing certificate preferred",
            &json!({ "preferredTokenSigningKeyThumbprint": certificate.thumbprint }),
        )
        .await?;

    info!(thumbprint = %certificate.thumbprint, "Made new signing certificate active");
    Ok(SigningOutcome::Rotated {
        thumbprint: certificate.thumbprint,
    })
}
