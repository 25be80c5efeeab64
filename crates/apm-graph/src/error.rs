//! Error types for the directory gateway

use apm_common::AuthError;
use thiserror::Error;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Any non-success response from Microsoft Graph.
    #[error(
        "operation `{}` failed with status `{}`, body `{}`",
        .operation,
        .status,
        display_body(.body)
    )]
    Request {
        operation: String,
        status: u16,
        body: Option<serde_json::Value>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl GraphError {
    /// Status code of a failed request, if this is a remote failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn display_body(body: &Option<serde_json::Value>) -> String {
    match body {
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}
