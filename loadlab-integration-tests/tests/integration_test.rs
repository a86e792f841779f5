use futures::future::join_all;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use loadlab_client::{Client, ClientConfig};
use loadlab_common::{Endpoint, LoadLabError, STREAM_COMPLETED_LINE};
use loadlab_server::{Server, ServerConfig};

const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(60);

async fn start_server() -> Client {
    let (ready_tx, ready_rx) = oneshot::channel();

    let server = Server::new(ServerConfig {
        address: "127.0.0.1:0".parse().unwrap(),
    });

    tokio::spawn(async move {
        server.run(ready_tx).await.expect("server failed");
    });

    let addr = timeout(SERVER_READY_TIMEOUT, ready_rx)
        .await
        .expect("server did not start within 60 seconds")
        .expect("server ready signal dropped");

    Client::new(ClientConfig {
        base_url: format!("http://{}", addr),
    })
}

#[tokio::test]
async fn test_health_round_trip() {
    let client = start_server().await;

    let health = client.health().await.expect("health failed");
    assert_eq!(health.status, "ok");
    assert!(health.uptime >= 0.0);
}

#[tokio::test]
async fn test_fresh_server_stats_count_only_the_stats_call() {
    let client = start_server().await;

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.error_rate, "0.00%");
    assert_eq!(stats.requests_by_endpoint.get("/stats"), Some(&1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_concurrent_health_checks_then_stats() {
    let client = start_server().await;

    let results = join_all((0..50).map(|_| client.health())).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.requests_by_endpoint["/health"], 50);
    assert_eq!(stats.total_requests, 51);
}

#[tokio::test]
async fn test_cpu_result_is_fib_35() {
    let client = start_server().await;

    let cpu = client.cpu().await.expect("cpu failed");
    assert_eq!(cpu.result, 9_227_465);
}

#[tokio::test]
async fn test_slow_delay_within_range() {
    let client = start_server().await;

    let slow = client.slow().await.expect("slow failed");
    assert!((100..=500).contains(&slow.delay_ms), "delay {}", slow.delay_ms);
}

#[tokio::test]
async fn test_memory_reports_allocation() {
    let client = start_server().await;

    let memory = client.memory().await.expect("memory failed");
    assert_eq!(memory.allocated_mb, 10);
    assert!(memory.memory_usage.rss_mb > 0);
}

#[tokio::test]
async fn test_json_echo() {
    let client = start_server().await;

    let payload = serde_json::json!({"user_id": 1, "action": "delete"});
    let echo = client.echo_json(&payload).await.expect("echo failed");
    assert_eq!(echo.received_keys, 2);
    assert_eq!(echo.echo, payload);
}

#[tokio::test]
async fn test_error_endpoint_failures_match_error_count() {
    let client = start_server().await;

    let mut failures = 0u64;
    for _ in 0..200 {
        match client.error().await {
            Ok(body) => assert_eq!(body.status, "ok"),
            Err(LoadLabError::HttpError(500, msg)) => {
                assert_eq!(msg, "This is a simulated error");
                failures += 1;
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    // 200 draws at p = 0.3: mean 60, sd ~6.5.
    assert!((20..=100).contains(&failures), "failures {failures}");

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.error_count, failures);
    assert_eq!(stats.requests_by_endpoint["/error"], 200);
    assert!(stats.error_count <= stats.total_requests);
}

#[tokio::test]
async fn test_large_payload_size() {
    let client = start_server().await;

    let large = client.large().await.expect("large failed");
    assert_eq!(large.size_bytes, 1_048_576);
    assert_eq!(large.data.len(), 1_048_576);
    assert_eq!(large.size_mb, "1.00");
}

#[tokio::test]
async fn test_async_results_in_order() {
    let client = start_server().await;

    let body = client.async_ops().await.expect("async failed");
    let expected: Vec<String> = (1..=5).map(|k| format!("Operation {k} completed")).collect();
    assert_eq!(body.results, expected);
}

#[tokio::test]
async fn test_stream_lines() {
    let client = start_server().await;

    let lines = client.stream().await.expect("stream failed");
    assert_eq!(lines.len(), 11);
    for (i, line) in lines[..10].iter().enumerate() {
        assert!(line.starts_with(&format!("Chunk {}: ", i + 1)), "line {line:?}");
    }
    assert_eq!(lines[10], STREAM_COMPLETED_LINE);
}

/// A client that gives up mid-stream is still counted and does not disturb the server.
#[tokio::test]
async fn test_stream_abandoned_midway_stays_counted() {
    let client = start_server().await;
    let url = client.build_url(Endpoint::Stream);

    let mut response = reqwest::get(&url).await.expect("stream request failed");
    let first = response.chunk().await.expect("read failed").expect("no first chunk");
    assert!(String::from_utf8_lossy(&first).starts_with("Chunk 1: "));
    drop(response);

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.requests_by_endpoint["/stream"], 1);
    assert_eq!(stats.error_count, 0);
}

#[tokio::test]
async fn test_docs_and_unknown_route() {
    let client = start_server().await;

    let docs = client.docs().await.expect("docs failed");
    assert!(docs.endpoints.contains_key("GET /stream"));

    let status = reqwest::get(format!("{}/does-not-exist", client.config.base_url))
        .await
        .expect("request failed")
        .status();
    assert_eq!(status.as_u16(), 404);

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.requests_by_endpoint["/does-not-exist"], 1);
    assert_eq!(stats.requests_by_endpoint.values().sum::<u64>(), stats.total_requests);
}

#[tokio::test]
async fn test_hit_covers_every_endpoint() {
    let client = start_server().await;

    for endpoint in Endpoint::ALL {
        let status = client.hit(endpoint).await.expect("hit failed");
        if endpoint == Endpoint::Error {
            assert!(status == 200 || status == 500, "status {status}");
        } else {
            assert_eq!(status, 200, "{}", endpoint.label());
        }
    }

    let stats = client.stats().await.expect("stats failed");
    assert_eq!(stats.total_requests, Endpoint::ALL.len() as u64 + 1);
}
