//! Directory gateway for the app proxy manager
//!
//! Authenticated access to the Microsoft Graph resources the reconciler touches:
//! applications, service principals, groups, app role assignments and
//! permission catalogs. Pure transport, no reconciliation policy.

pub mod client;
pub mod directory;
pub mod error;
pub mod models;

pub use client::{GraphClient, Visibility};
pub use directory::{odata_quote, Directory, CUSTOM_APPLICATION_TEMPLATE_ID};
pub use error::{GraphError, GraphResult};
pub use models::*;
