use loadlab_client::{sample_json_payload, Client, ClientConfig};
use loadlab_common::{Endpoint, LoadLabError};

// Helper: a client aimed at the given mockito server URL.
fn client_for(server_url: &str) -> Client {
    Client::new(ClientConfig { base_url: server_url.to_string() })
}

// Helper: a client pointed at localhost:8080 for tests that never actually connect.
fn localhost_client() -> Client {
    Client::new(ClientConfig { base_url: "http://127.0.0.1:8080".to_string() })
}

#[test]
fn test_client_creation_with_config() {
    let client = Client::new(ClientConfig { base_url: "http://example.com:3000".to_string() });
    assert_eq!(client.config.base_url, "http://example.com:3000");
}

#[test]
fn test_build_url() {
    let client = localhost_client();
    assert_eq!(client.build_url(Endpoint::Health), "http://127.0.0.1:8080/health");
    assert_eq!(client.build_url(Endpoint::Docs), "http://127.0.0.1:8080/");
}

#[test]
fn test_build_url_tolerates_trailing_slash() {
    let client = Client::new(ClientConfig { base_url: "http://localhost:9000/".to_string() });
    assert_eq!(client.build_url(Endpoint::Stats), "http://localhost:9000/stats");
}

#[tokio::test]
async fn test_health_parses_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"ok","timestamp":"2025-01-01T00:00:00.000Z","uptime":1.25}"#)
        .create_async()
        .await;

    let health = client_for(&server.url()).health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.uptime, 1.25);
}

#[tokio::test]
async fn test_error_maps_500_envelope_to_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/error")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"Random error occurred","message":"This is a simulated error"}"#)
        .create_async()
        .await;

    let result = client_for(&server.url()).error().await;
    assert_eq!(
        result,
        Err(LoadLabError::HttpError(500, "This is a simulated error".to_string()))
    );
}

#[tokio::test]
async fn test_error_without_envelope_uses_status_text() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/memory").with_status(503).create_async().await;

    let result = client_for(&server.url()).memory().await;
    assert!(matches!(result, Err(LoadLabError::HttpError(503, msg)) if msg.contains("503")));
}

#[tokio::test]
async fn test_invalid_body_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/cpu")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let result = client_for(&server.url()).cpu().await;
    assert!(matches!(result, Err(LoadLabError::InvalidBody(_))));
}

#[tokio::test]
async fn test_echo_json_posts_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/json")
        .match_body(mockito::Matcher::Json(serde_json::json!({"a": 1, "b": 2})))
        .with_status(200)
        .with_body(r#"{"message":"JSON processed successfully","received_keys":2,"echo":{"a":1,"b":2}}"#)
        .create_async()
        .await;

    let echo = client_for(&server.url())
        .echo_json(&serde_json::json!({"a": 1, "b": 2}))
        .await
        .unwrap();
    assert_eq!(echo.received_keys, 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_stream_collects_lines() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/stream")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("Chunk 1: a\nChunk 2: b\nStream completed\n")
        .create_async()
        .await;

    let lines = client_for(&server.url()).stream().await.unwrap();
    assert_eq!(lines, vec!["Chunk 1: a", "Chunk 2: b", "Stream completed"]);
}

#[tokio::test]
async fn test_hit_returns_status_for_any_response() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/error").with_status(500).with_body("{}").create_async().await;
    server.mock("GET", "/health").with_status(200).with_body("{}").create_async().await;

    let client = client_for(&server.url());
    assert_eq!(client.hit(Endpoint::Error).await, Ok(500));
    assert_eq!(client.hit(Endpoint::Health).await, Ok(200));
}

#[tokio::test]
async fn test_hit_json_sends_sample_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/json")
        .match_body(mockito::Matcher::Json(sample_json_payload()))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    assert_eq!(client_for(&server.url()).hit(Endpoint::Json).await, Ok(200));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_network_error_when_nothing_listens() {
    // Port 1 is reserved and never has a listener in test environments.
    let client = Client::new(ClientConfig { base_url: "http://127.0.0.1:1".to_string() });
    assert!(matches!(client.health().await, Err(LoadLabError::NetworkError(_))));
}
