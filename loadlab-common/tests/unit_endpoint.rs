use loadlab_common::{Endpoint, MemoryUsage, StatsResponse};

#[test]
fn test_paths_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for endpoint in Endpoint::ALL {
        assert!(seen.insert(endpoint.path()), "duplicate path {}", endpoint.path());
    }
    assert_eq!(Endpoint::Docs.path(), "/");
}

#[test]
fn test_only_json_is_post() {
    for endpoint in Endpoint::ALL {
        let expected = if endpoint == Endpoint::Json { "POST" } else { "GET" };
        assert_eq!(endpoint.method(), expected, "{:?}", endpoint);
    }
    assert_eq!(Endpoint::Health.label(), "GET /health");
    assert_eq!(Endpoint::Json.label(), "POST /json");
}

#[test]
fn test_memory_usage_omits_external_when_absent() {
    let usage = MemoryUsage { rss_mb: 12, heap_used_mb: 3, heap_total_mb: 4, external_mb: None };
    let json = serde_json::to_value(usage).unwrap();
    assert!(json.get("external_mb").is_none());
    assert_eq!(json["rss_mb"], 12);
}

#[test]
fn test_stats_response_parses_server_shape() {
    let json = r#"{
        "uptime_seconds": 4,
        "total_requests": 3,
        "requests_by_endpoint": {"/health": 2, "/stats": 1},
        "error_count": 0,
        "error_rate": "0.00%",
        "requests_per_second": "0.75",
        "memory_usage": {"rss_mb": 20, "heap_used_mb": 2, "heap_total_mb": 5, "external_mb": 300},
        "process": {"pid": 42, "version": "0.1.0", "platform": "linux", "uptime_seconds": 4}
    }"#;
    let stats: StatsResponse = serde_json::from_str(json).unwrap();
    assert_eq!(stats.requests_by_endpoint["/health"], 2);
    assert_eq!(stats.requests_by_endpoint.values().sum::<u64>(), stats.total_requests);
    assert_eq!(stats.memory_usage.external_mb, Some(300));
}
