// HTTP contract tests for `ApiClient` using wiremock.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use endpointmonitor_provider::client::API_KEY_HEADER;
use endpointmonitor_provider::config::ClientOptions;
use endpointmonitor_provider::types::Deletion;
use endpointmonitor_provider::{
    ApiClient, ConnectionConfig, EndpointMonitorProvider, MonitorApi, ProviderError,
    ResourceKind, SearchHit, SearchKind,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let config = ConnectionConfig::new(server.uri(), SecretString::from("test-key")).unwrap();
    let client = ApiClient::new(&config, &ClientOptions::default()).unwrap();
    (server, client)
}

fn attrs(value: serde_json::Value) -> endpointmonitor_provider::Attributes {
    value.as_object().cloned().unwrap()
}

// ── Search ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_sends_key_and_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/host-group/search"))
        .and(query_param("search", "prod-east"))
        .and(header(API_KEY_HEADER, "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": 7, "name": "prod-east" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hits = client.search(SearchKind::HostGroup, "prod-east").await.unwrap();
    assert_eq!(hits, vec![SearchHit::new(7, "prod-east")]);
}

#[tokio::test]
async fn test_search_preserves_service_order() {
    let (server, client) = setup().await;

    let body = json!([
        { "id": 30, "name": "db-3" },
        { "id": 10, "displayName": "db-1" },
        { "id": 20, "name": "db-2" },
    ]);

    Mock::given(method("GET"))
        .and(path("/api/check/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let hits = client.search(SearchKind::Check, "db").await.unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
    assert_eq!(ids, [30, 10, 20]);
    assert_eq!(hits[1].name, "db-1");
}

#[tokio::test]
async fn test_search_with_no_matches_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/proxy-host/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let hits = client.search(SearchKind::ProxyHost, "nothing").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_with_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/check/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.search(SearchKind::Check, "x").await.unwrap_err();
    match err {
        ProviderError::Deserialization { message, body } => {
            assert!(message.contains("body preview"));
            assert_eq!(body, "<html>login</html>");
        },
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── CRUD ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_returns_remote_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/url-check"))
        .and(body_json(json!({ "name": "home", "url": "https://example.com" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 101,
            "name": "home",
            "url": "https://example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client
        .create(
            ResourceKind::UrlCheck,
            &attrs(json!({ "name": "home", "url": "https://example.com" })),
        )
        .await
        .unwrap();

    assert_eq!(created.id, 101);
    assert_eq!(created.attributes["url"], "https://example.com");
    assert!(!created.attributes.contains_key("id"));
}

#[tokio::test]
async fn test_create_response_without_id_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/check-group"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "g" })))
        .mount(&server)
        .await;

    let err = client
        .create(ResourceKind::CheckGroup, &attrs(json!({ "name": "g" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Deserialization { .. }));
}

#[tokio::test]
async fn test_get_missing_object_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dns-check/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let found = client.get(ResourceKind::DnsCheck, 42).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_get_existing_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/maintenance-period/5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 5, "name": "weekly" })),
        )
        .mount(&server)
        .await;

    let found = client
        .get(ResourceKind::MaintenancePeriod, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, 5);
    assert_eq!(found.kind, ResourceKind::MaintenancePeriod);
}

#[tokio::test]
async fn test_update_missing_object_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/host-group/9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .update(ResourceKind::HostGroup, 9, &attrs(json!({ "name": "x" })))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_status_mapping() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/ping-check/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/ping-check/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(
        client.delete(ResourceKind::PingCheck, 1).await.unwrap(),
        Deletion::Deleted
    );
    assert_eq!(
        client.delete(ResourceKind::PingCheck, 42).await.unwrap(),
        Deletion::AlreadyAbsent
    );
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/check-host/search"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid API key" })),
        )
        .mount(&server)
        .await;

    let err = client.search(SearchKind::CheckHost, "web").await.unwrap_err();
    match err {
        ProviderError::Authentication { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        },
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/proxy-host/3"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.delete(ResourceKind::ProxyHost, 3).await.unwrap_err();
    assert!(matches!(err, ProviderError::Authentication { status: 403, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/socket-check/8"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let err = client.get(ResourceKind::SocketCheck, 8).await.unwrap_err();
    match &err {
        ProviderError::Api { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "database unavailable");
        },
        other => panic!("expected Api, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let config =
        ConnectionConfig::new("http://127.0.0.1:1", SecretString::from("test-key")).unwrap();
    let options = ClientOptions::default().with_timeout(Duration::from_secs(2));
    let client = ApiClient::new(&config, &options).unwrap();

    let err = client.get(ResourceKind::CheckHost, 1).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/check/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let handle = client.with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = handle.search(SearchKind::Check, "slow").await.unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled));
    canceller.await.unwrap();
}

// ── Provider session end to end ─────────────────────────────────────

#[tokio::test]
async fn test_configured_session_reads_data_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard-group/search"))
        .and(query_param("search", "ops"))
        .and(header(API_KEY_HEADER, "env-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 4, "name": "ops" },
            { "id": 6, "name": "ops-night" },
        ])))
        .mount(&server)
        .await;

    let env = HashMap::from([("EPM_API_KEY".to_string(), "env-key".to_string())]);
    let session = EndpointMonitorProvider::new()
        .configure_json(&json!({ "url": server.uri() }), &env)
        .unwrap();

    let state = session
        .read_data_source("endpointmonitor_dashboard_groups", &json!({ "search": "ops" }))
        .await
        .unwrap();
    assert_eq!(state, json!({ "search": "ops", "ids": [4, 6] }));

    let diags = session
        .read_data_source("endpointmonitor_dashboard_group", &json!({ "search": "ops" }))
        .await
        .unwrap_err();
    assert_eq!(
        diags.as_slice()[0].summary,
        "None or more than one matching dashboard group found"
    );
}

#[tokio::test]
async fn test_configured_session_deletes_idempotently() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/web-journey-check/42"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let env = HashMap::from([
        ("EPM_URL".to_string(), server.uri()),
        ("EPM_API_KEY".to_string(), "k".to_string()),
    ]);
    let session = EndpointMonitorProvider::new()
        .configure_json(&json!({}), &env)
        .unwrap();

    let outcome = session
        .delete("endpointmonitor_web_journey_check", &json!({ "id": 42 }))
        .await
        .unwrap();
    assert!(outcome.diagnostics.is_empty());
    assert!(outcome.resource.is_none());
}
