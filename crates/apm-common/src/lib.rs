//! Shared plumbing for the app proxy manager crates.
//!
//! - [`logging`]: tracing subscriber setup (text or JSON output)
//! - [`auth`]: bearer token providers for Microsoft Graph and Key Vault

pub mod auth;
pub mod logging;

pub use auth::{AuthError, ClientCredentials, StaticToken, TokenProvider};
