//! Admin surface and credential lifecycle.

use reqwest::StatusCode;

mod common;
use common::{admin_token, base_config, client, spawn_gateway, start_mock_backend};

#[tokio::test]
async fn admin_routes_require_a_valid_bearer_token() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();

    let res = client
        .get(gateway.url("/admin/circuit-breakers"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(gateway.url("/admin/circuit-breakers"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(gateway.url("/admin/circuit-breakers"))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn circuit_breaker_status_and_reset() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();
    let token = admin_token();

    let body: serde_json::Value = client
        .get(gateway.url("/admin/circuit-breakers"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let breaker = &body["/api/users"];
    assert_eq!(breaker["state"], "closed");
    assert_eq!(breaker["failure_count"], 0);
    assert!(breaker.get("last_state_change").is_some());

    // Reset succeeds for a known route...
    let res = client
        .post(gateway.url("/admin/circuit-breakers/api/users"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // ...and 404s for an unknown one.
    let res = client
        .post(gateway.url("/admin/circuit-breakers/api/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn services_health_reports_per_route_rollups() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();

    let body: serde_json::Value = client
        .get(gateway.url("/admin/services/health"))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let report = &body["/api/users"];
    assert_eq!(report["overall_health"], "healthy");
    assert_eq!(report["healthy_count"], 1);
    assert_eq!(report["total_count"], 1);
    assert_eq!(report["healthy_targets"].as_array().unwrap().len(), 1);
    let target = &report["target_status"][0];
    assert_eq!(target["is_healthy"], true);
    assert!(target.get("failure_count").is_some());
}

#[tokio::test]
async fn gateway_health_endpoint_reports_dependency_checks() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();

    let res = client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"], true);
    assert_eq!(body["checks"]["registry"], true);

    gateway.store.set_failing(true);
    let res = client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["store"], false);
}

#[tokio::test]
async fn credential_lifecycle_create_use_delete() {
    let backend = start_mock_backend(200, "ok").await;
    let gateway = spawn_gateway(base_config(vec![backend])).await;
    let client = client();
    let token = admin_token();

    // Create
    let created: serde_json::Value = client
        .post(gateway.url("/admin/keys"))
        .bearer_auth(&token)
        .json(&serde_json::json!({"name": "ci", "tier": "basic"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let api_key = created["key"].as_str().unwrap().to_string();
    let key_id = created["id"].as_str().unwrap().to_string();
    assert!(api_key.starts_with("gw_"));

    // Use
    let res = client
        .get(gateway.url("/api/users/1"))
        .header("X-API-Key", &api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("X-RateLimit-Tier")
            .and_then(|v| v.to_str().ok()),
        Some("basic")
    );

    // A wrong key is rejected outright.
    let res = client
        .get(gateway.url("/api/users/1"))
        .header("X-API-Key", "gw_definitely_not_real")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // List includes it; the hash never leaves the registry.
    let listed: serde_json::Value = client
        .get(gateway.url("/admin/keys"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = listed
        .as_array()
        .unwrap()
        .iter()
        .find(|k| k["id"] == key_id.as_str())
        .expect("created key missing from list");
    assert!(entry.get("key_hash").is_none());

    // Deactivate, then the key stops working (cache invalidated).
    let res = client
        .put(gateway.url(&format!("/admin/keys/{}", key_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({"is_active": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(gateway.url("/api/users/1"))
        .header("X-API-Key", &api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Delete; a later lookup 404s.
    let res = client
        .delete(gateway.url(&format!("/admin/keys/{}", key_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(gateway.url(&format!("/admin/keys/{}", key_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
