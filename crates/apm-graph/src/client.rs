//! Microsoft Graph HTTP transport
//!
//! Thin authenticated wrapper around `reqwest`:
//! - bearer token injection from a [`TokenProvider`] (one refresh on 401)
//! - uniform failure mapping into [`GraphError::Request`]
//! - continuation links restricted to the configured Graph host

use apm_common::TokenProvider;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{GraphError, GraphResult};
use crate::models::ApiVersion;

/// Outcome of reading an object that may not have propagated yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Visible,
    NotFound,
    /// Any other non-success status.
    Failed {
        status: u16,
        body: Option<serde_json::Value>,
    },
}

/// Authenticated Microsoft Graph client.
#[derive(Clone)]
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    /// Create a client for `base_url` (e.g. `https://graph.microsoft.com`).
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("apm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http_client(base_url, tokens, http_client))
    }

    pub fn with_http_client(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a resource path under an API version.
    pub fn url(&self, version: ApiVersion, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            version.as_str(),
            path.trim_start_matches('/')
        )
    }

    /// Reject continuation links that point away from the Graph host, so the
    /// bearer token is never sent elsewhere.
    pub fn check_continuation(&self, link: &str) -> GraphResult<()> {
        if link.starts_with(&format!("{}/", self.base_url)) {
            Ok(())
        } else {
            Err(GraphError::UnexpectedResponse(format!(
                "continuation link outside {}: {}",
                self.base_url, link
            )))
        }
    }

    /// Send a request built by `build`, retrying once with a fresh token on 401.
    async fn send<F>(&self, build: F) -> GraphResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.tokens.token().await?;
        let response = build(&self.http_client).bearer_auth(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Graph returned 401, refreshing token");
        self.tokens.invalidate().await;
        let token = self.tokens.token().await?;
        Ok(build(&self.http_client).bearer_auth(&token).send().await?)
    }

    /// Convert a non-success response into [`GraphError::Request`].
    async fn request_error(operation: &str, response: Response) -> GraphError {
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.ok();
        GraphError::Request {
            operation: operation.to_string(),
            status,
            body,
        }
    }

    async fn expect_success(operation: &str, response: Response) -> GraphResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::request_error(operation, response).await)
        }
    }

    /// GET an absolute URL with optional query parameters and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> GraphResult<T> {
        debug!(%url, operation, "GET");
        let response = self
            .send(|http| http.request(Method::GET, url).query(query))
            .await?;
        let response = Self::expect_success(operation, response).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<B, T>(&self, operation: &str, url: &str, body: &B) -> GraphResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, operation, "POST");
        let response = self
            .send(|http| http.request(Method::POST, url).json(body))
            .await?;
        let response = Self::expect_success(operation, response).await?;
        Ok(response.json().await?)
    }

    /// PATCH a JSON body; Graph answers 204 No Content.
    pub async fn patch<B>(&self, operation: &str, url: &str, body: &B) -> GraphResult<()>
    where
        B: Serialize + ?Sized,
    {
        debug!(%url, operation, "PATCH");
        let response = self
            .send(|http| http.request(Method::PATCH, url).json(body))
            .await?;
        Self::expect_success(operation, response).await?;
        Ok(())
    }

    pub async fn delete(&self, operation: &str, url: &str) -> GraphResult<()> {
        debug!(%url, operation, "DELETE");
        let response = self.send(|http| http.request(Method::DELETE, url)).await?;
        Self::expect_success(operation, response).await?;
        Ok(())
    }

    /// PUT raw bytes (stream endpoints such as the application logo).
    pub async fn put_bytes(
        &self,
        operation: &str,
        url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> GraphResult<()> {
        debug!(%url, operation, size = bytes.len(), "PUT");
        let response = self
            .send(|http| {
                http.request(Method::PUT, url)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(bytes.clone())
            })
            .await?;
        Self::expect_success(operation, response).await?;
        Ok(())
    }

    /// Read `url` and classify the outcome without failing on 404.
    pub async fn probe(&self, url: &str) -> GraphResult<Visibility> {
        let response = self.send(|http| http.request(Method::GET, url)).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(Visibility::Visible);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(Visibility::NotFound);
        }

        let body = response.json::<serde_json::Value>().await.ok();
        warn!(%url, status = status.as_u16(), "Unexpected status while probing object");
        Ok(Visibility::Failed {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
