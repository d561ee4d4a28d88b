//! HTTP provider client tests against a mock management API

use keywarden::config::ProviderConfig;
use keywarden::domain::provider::{
    BatchOperation, ProviderClient, ProviderKeyId,
};
use keywarden::domain::DomainError;
use keywarden::infrastructure::provider::HttpProviderClient;

use serde_json::json;
use wiremock::matchers::{bearer_token, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keywarden::domain::provider::CreateProviderKey;

fn client_for(server: &MockServer) -> HttpProviderClient {
    let config = ProviderConfig {
        base_url: server.uri(),
        api_key: "admin-secret".to_string(),
        timeout_secs: 5,
    };
    HttpProviderClient::new(&config).unwrap()
}

#[test]
fn rejects_missing_api_key() {
    let config = ProviderConfig {
        base_url: "https://api.provider.example".to_string(),
        api_key: String::new(),
        timeout_secs: 5,
    };
    assert!(matches!(
        HttpProviderClient::new(&config),
        Err(DomainError::Configuration { .. })
    ));
}

#[tokio::test]
async fn create_key_returns_secret_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/keys"))
        .and(bearer_token("admin-secret"))
        .and(header_exists("Idempotency-Key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pk-123",
            "name": "user-1-key",
            "key": "sk-live-abc",
            "created_at": "2026-08-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created = client
        .create_key(CreateProviderKey::new("user-1-key").with_limit_usd(50.0))
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "pk-123");
    assert_eq!(created.key, "sk-live-abc");
}

#[tokio::test]
async fn get_missing_key_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/keys/pk-missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such key"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .get_key(&ProviderKeyId::from("pk-missing"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn server_error_carries_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/keys"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .create_key(CreateProviderKey::new("k"))
        .await
        .unwrap_err();

    match err {
        DomainError::Provider { status, message, .. } => {
            assert_eq!(status, Some(503));
            assert!(message.contains("maintenance"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn conflict_is_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/keys"))
        .respond_with(ResponseTemplate::new(409).set_body_string("name taken"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .create_key(CreateProviderKey::new("dup"))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Conflict { .. }));
}

#[tokio::test]
async fn delete_key_succeeds_on_2xx() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/keys/pk-1"))
        .and(bearer_token("admin-secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.delete_key(&ProviderKeyId::from("pk-1")).await.unwrap();
}

#[tokio::test]
async fn list_keys_passes_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/keys"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "pk-1",
                "name": "a",
                "limit_usd": 10.0,
                "created_at": "2026-08-01T00:00:00Z"
            },
            {
                "id": "pk-2",
                "name": "b",
                "created_at": "2026-08-02T00:00:00Z"
            }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let keys = client.list_keys(25).await.unwrap();

    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].limit_usd, Some(10.0));
    assert_eq!(keys[1].limit_usd, None);
}

#[tokio::test]
async fn batch_returns_per_id_outcomes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/keys/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "pk-1", "success": true },
            { "id": "pk-2", "success": false, "error": "not found" }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let results = client
        .batch(
            BatchOperation::Delete,
            &[ProviderKeyId::from("pk-1"), ProviderKeyId::from("pk-2")],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].error.as_deref(), Some("not found"));
}

#[tokio::test]
async fn empty_batch_skips_the_network() {
    // No mock mounted: a request would fail
    let server = MockServer::start().await;
    let client = client_for(&server);

    let results = client.batch(BatchOperation::Disable, &[]).await.unwrap();
    assert!(results.is_empty());
}
