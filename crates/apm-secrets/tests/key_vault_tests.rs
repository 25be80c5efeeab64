//! Key Vault Provider Tests
//!
//! Tests for:
//! - Reading secrets with api-version and bearer token
//! - Writing rotated secrets
//! - Not found and error mapping

use std::sync::Arc;

use apm_common::StaticToken;
use apm_secrets::{KeyVaultProvider, Provider, SecretRef, SecretsError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> KeyVaultProvider {
    KeyVaultProvider::new(
        "vault.azure.net",
        Arc::new(StaticToken::new("kv-token")),
        reqwest::Client::new(),
    )
    .with_endpoint(server.uri())
}

#[tokio::test]
async fn test_get_secret() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/contoso-tls"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", "Bearer kv-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "MIIK...",
            "id": "https://kv-prod.vault.azure.net/secrets/contoso-tls/abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = provider(&server)
        .get(&SecretRef::new("kv-prod", "contoso-tls"))
        .await
        .unwrap();

    assert_eq!(value, "MIIK...");
}

#[tokio::test]
async fn test_get_missing_secret() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/absent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "SecretNotFound"}
        })))
        .mount(&server)
        .await;

    let result = provider(&server)
        .get(&SecretRef::new("kv-prod", "absent"))
        .await;

    assert!(matches!(result, Err(SecretsError::NotFound(name)) if name == "kv-prod/absent"));
}

#[tokio::test]
async fn test_get_forbidden_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = provider(&server)
        .get(&SecretRef::new("kv-prod", "locked"))
        .await;

    match result {
        Err(SecretsError::ProviderError(message)) => {
            assert!(message.contains("403"));
            assert!(message.contains("Forbidden"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_set_secret() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/secrets/contoso-client-secret"))
        .and(query_param("api-version", "7.4"))
        .and(body_json(json!({"value": "generated"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "generated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .set(&SecretRef::new("kv-prod", "contoso-client-secret"), "generated")
        .await
        .unwrap();
}
