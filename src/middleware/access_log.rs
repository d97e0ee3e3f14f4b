//! Access logging and outcome capture.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::server::AppState;
use crate::middleware::api_key::AuthedKey;
use crate::middleware::request_id::RequestId;
use crate::observability::metrics;
use crate::observability::RequestLog;

/// Log each request and hand the outcome to the async log sink. Runs outside
/// credential resolution so it sees the final status of rejected requests too.
pub async fn access_log(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let timestamp = state.clock.now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;

    let latency = started.elapsed();
    let status = response.status().as_u16();
    let backend = response
        .headers()
        .get("X-Backend-Server")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let api_key_id = response.extensions().get::<AuthedKey>().map(|k| k.id);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status,
        latency_ms = latency.as_millis() as u64,
        client = %addr.ip(),
        backend = %backend,
        "request"
    );

    metrics::record_request(&method, status, &backend, started);

    state.sink.record(RequestLog {
        timestamp,
        api_key_id,
        method,
        path,
        status_code: status,
        response_time_ms: latency.as_millis() as i64,
        ip_address: addr.ip().to_string(),
        user_agent,
        backend_server: backend,
    });

    response
}
