//! Error types for the reconciliation engine

use apm_graph::GraphError;
use apm_secrets::SecretsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Non-success response or transport failure from the directory.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Secret store error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("object {object_id} never became visible after {attempts} attempts")]
    NeverVisible { object_id: String, attempts: u32 },

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("group name {name} is ambiguous: {count} security groups match")]
    AmbiguousGroup { name: String, count: usize },

    #[error("application {name} is ambiguous: {count} applications match")]
    AmbiguousApplication { name: String, count: usize },

    #[error("found application {name} but {count} service principals match")]
    AmbiguousServicePrincipal { name: String, count: usize },

    #[error("found application {name} but no service principal, aborting")]
    ServicePrincipalMissing { name: String },

    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    #[error("service principal {0} publishes no app roles")]
    NoDefaultRole(String),

    #[error("assignments of group {group_id} span more than {limit} pages")]
    PaginationLimit { group_id: String, limit: usize },

    #[error("failed to download logo from {url}: {message}")]
    LogoDownload { url: String, message: String },
}

/// PKCS#12 repackaging failures.
#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed PKCS#12 container: {0}")]
    Malformed(String),

    #[error("unsupported PKCS#12 encryption: PBES2 containers must be exported with legacy (3DES) encryption")]
    UnsupportedEncryption,

    #[error("no certificate found")]
    NoCertificate,

    #[error("no key found")]
    NoKey,

    #[error("failed to build PKCS#12 container")]
    Build,
}
