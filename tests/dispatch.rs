//! Routing, load balancing and health exclusion through the full pipeline.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;

mod common;
use common::{base_config, client, dead_backend, spawn_gateway, start_mock_backend};

#[tokio::test]
async fn proxies_to_the_configured_backend() {
    let backend = start_mock_backend(200, "hello from upstream").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();

    let res = client
        .get(gateway.url("/api/users/42"))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("X-Backend-Server")
            .and_then(|v| v.to_str().ok()),
        Some(format!("http://{}", backend).as_str())
    );
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello from upstream");
}

#[tokio::test]
async fn unknown_paths_return_404() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();

    let res = client.get(gateway.url("/api/orders/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn round_robin_distributes_evenly() {
    let b0 = start_mock_backend(200, "b0").await;
    let b1 = start_mock_backend(200, "b1").await;
    let b2 = start_mock_backend(200, "b2").await;
    let gateway = spawn_gateway(base_config(vec![b0, b1, b2])).await;
    let client = client();

    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..12 {
        let res = client.get(gateway.url("/api/users/1")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let backend = res
            .headers()
            .get("X-Backend-Server")
            .and_then(|v| v.to_str().ok())
            .expect("backend header missing")
            .to_string();
        *counts.entry(backend).or_insert(0) += 1;
    }

    assert_eq!(counts.len(), 3, "all three backends should serve");
    assert!(
        counts.values().all(|&c| c == 4),
        "expected (4,4,4), got {:?}",
        counts
    );
}

#[tokio::test]
async fn unhealthy_targets_are_excluded_from_dispatch() {
    let alive = start_mock_backend(200, "alive").await;
    let dead = dead_backend().await;

    let mut config = base_config(vec![alive, dead]);
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    config.health_check.max_failures = 2;
    let gateway = spawn_gateway(config).await;
    let client = client();

    // Give the probe loop time to cross the failure threshold.
    tokio::time::sleep(Duration::from_secs(4)).await;

    let dead_url = format!("http://{}", dead);
    for _ in 0..10 {
        let res = client.get(gateway.url("/api/users/1")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let backend = res
            .headers()
            .get("X-Backend-Server")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_ne!(backend, dead_url, "dispatched to an unhealthy target");
    }
}

#[tokio::test]
async fn no_healthy_upstream_returns_503() {
    let dead = dead_backend().await;
    let mut config = base_config(vec![dead]);
    config.health_check.assume_healthy_on_start = false;
    let gateway = spawn_gateway(config).await;
    let client = client();

    let res = client.get(gateway.url("/api/users/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No healthy backend servers available");
}

#[tokio::test]
async fn longest_prefix_wins_when_routes_nest() {
    let general = start_mock_backend(200, "general").await;
    let specific = start_mock_backend(200, "specific").await;

    let mut config = base_config(vec![general]);
    config.services.push(api_gateway::config::ServiceConfig {
        path: "/api/users/reports".to_string(),
        targets: vec![format!("http://{}", specific)],
    });
    let gateway = spawn_gateway(config).await;
    let client = client();

    let res = client
        .get(gateway.url("/api/users/reports/weekly"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "specific");

    let res = client.get(gateway.url("/api/users/7")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "general");
}
