//! Admin endpoint handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::health::{ServiceHealth, TargetStatus};
use crate::http::server::AppState;
use crate::registry::{ApiKey, CredentialUpdate};
use crate::resilience::BreakerSnapshot;

/// GET /admin/circuit-breakers
pub async fn get_circuit_breakers(
    State(state): State<AppState>,
) -> Json<HashMap<String, BreakerSnapshot>> {
    let snapshots = state
        .proxies
        .iter()
        .map(|(route, proxy)| (route.clone(), proxy.breaker().snapshot()))
        .collect();
    Json(snapshots)
}

/// POST /admin/circuit-breakers/{*service}
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<serde_json::Value>> {
    // The wildcard strips the leading slash the route map keys carry.
    let route = format!("/{}", service);

    let proxy = state
        .proxies
        .get(&route)
        .ok_or_else(|| GatewayError::NotFound("Service not found".to_string()))?;

    proxy.breaker().reset();
    tracing::info!(route = %route, "Circuit breaker reset by admin");

    Ok(Json(json!({
        "message": "Circuit breaker reset successfully",
        "service": route,
    })))
}

#[derive(Serialize)]
pub struct ServiceHealthReport {
    pub overall_health: ServiceHealth,
    pub healthy_count: usize,
    pub total_count: usize,
    pub healthy_targets: Vec<String>,
    pub target_status: Vec<TargetStatus>,
}

/// GET /admin/services/health
pub async fn get_services_health(
    State(state): State<AppState>,
) -> Json<HashMap<String, ServiceHealthReport>> {
    let reports = state
        .proxies
        .iter()
        .map(|(route, proxy)| {
            let checker = proxy.checker();
            let healthy_targets = checker.healthy_targets();
            let report = ServiceHealthReport {
                overall_health: checker.overall_health(),
                healthy_count: healthy_targets.len(),
                total_count: checker.all_targets().len(),
                healthy_targets,
                target_status: checker.all_status(),
            };
            (route.clone(), report)
        })
        .collect();
    Json(reports)
}

/// GET /admin/status
pub async fn get_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let keys = state.registry.list().await?;
    Ok(Json(json!({
        "gateway": "running",
        "environment": state.config.server.environment,
        "services": state.config.services.len(),
        "api_keys": keys.len(),
        "uptime_secs": (state.clock.now() - state.started_at).num_seconds(),
        "timestamp": state.clock.now().timestamp(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: String,
}

fn default_tier() -> String {
    "basic".to_string()
}

#[derive(Serialize)]
pub struct CreatedKey {
    pub id: Uuid,
    /// The plaintext key. Shown exactly once.
    pub key: String,
    pub name: String,
    pub tier: String,
    pub created_at: DateTime<Utc>,
}

/// POST /admin/keys
pub async fn create_key(
    State(state): State<AppState>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreatedKey>)> {
    if state.config.find_tier(&body.tier).is_none() {
        tracing::warn!(tier = %body.tier, "Creating key with unconfigured tier");
    }

    let (plaintext, key) = state.registry.create(&body.name, "admin", &body.tier).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedKey {
            id: key.id,
            key: plaintext,
            name: key.name,
            tier: key.tier,
            created_at: key.created_at,
        }),
    ))
}

/// GET /admin/keys
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<Vec<ApiKey>>> {
    Ok(Json(state.registry.list().await?))
}

/// GET /admin/keys/{id}
pub async fn get_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKey>> {
    state
        .registry
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound("API key not found".to_string()))
}

/// PUT /admin/keys/{id}
pub async fn update_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<CredentialUpdate>,
) -> Result<Json<serde_json::Value>> {
    if state.registry.update(id, &update).await? {
        Ok(Json(json!({"message": "API key updated"})))
    } else {
        Err(GatewayError::NotFound("API key not found".to_string()))
    }
}

/// DELETE /admin/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if state.registry.delete(id).await? {
        Ok(Json(json!({"message": "API key deleted"})))
    } else {
        Err(GatewayError::NotFound("API key not found".to_string()))
    }
}
