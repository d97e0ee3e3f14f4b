//! Administrative surface.
//!
//! Bearer-token-protected routes for inspecting circuit breakers and
//! upstream health, and for managing API key credentials.

pub mod handlers;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_auth;
use crate::http::server::AppState;

use self::handlers::*;

/// Routes nested under `/admin`. The caller supplies the shared state; the
/// bearer-auth layer guards everything registered here.
pub fn admin_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/circuit-breakers", get(get_circuit_breakers))
        .route("/circuit-breakers/{*service}", post(reset_circuit_breaker))
        .route("/services/health", get(get_services_health))
        .route("/status", get(get_status))
        .route("/keys", post(create_key).get(list_keys))
        .route(
            "/keys/{id}",
            get(get_key).put(update_key).delete(delete_key),
        )
        .layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_auth,
        ))
}
