//! Reconciliation engine for Entra application proxy applications
//!
//! Converges each declared application to its declaration through the
//! [`apm_graph::Directory`] seam:
//! - find-or-create of the application / service principal pair, waiting out
//!   replication lag
//! - configuration steps (URIs, logo, publishing, TLS, SAML, optional claims)
//! - Microsoft Graph permission grants, app roles and group role assignments
//! - signing certificate and client secret rotation
//!
//! Every step is idempotent: a second run against an unchanged directory
//! issues no creating call.

pub mod app_roles;
pub mod application;
pub mod assignments;
pub mod client_secret;
pub mod configure;
pub mod error;
pub mod orchestrator;
pub mod pfx;
pub mod resource_access;
pub mod signing;
pub mod waiter;

pub use application::{delete_by_name, find_by_prefix, find_or_create, ApplicationIds};
pub use assignments::{ensure_assigned, AssignmentOutcome, MAX_ASSIGNMENT_PAGES};
pub use error::{CertificateError, ReconcileError, Result};
pub use orchestrator::{Reconciler, ReconcilerOptions, RunReport};
pub use signing::{SigningOutcome, SigningPolicy};
pub use waiter::{wait_until_visible, WaitPolicy};
