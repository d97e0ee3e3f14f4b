//! Gateway error taxonomy.
//!
//! Every component returns a `GatewayError`; the HTTP layer converts it into
//! the response the client sees. The mapping is deliberate:
//! - rate-limit store failures are fail-closed (500, never an implicit permit)
//! - credential-registry outages are 503 "authentication unavailable",
//!   distinct from 401 for an invalid or inactive key
//! - breaker rejections and an empty healthy subset are both 503

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("state store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("authentication unavailable")]
    AuthUnavailable,

    #[error("invalid API key")]
    InvalidCredential,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("rate limit exceeded")]
    RateLimited {
        tier: String,
        limit: u32,
        retry_after: i64,
    },

    #[error("no healthy backend servers available")]
    NoHealthyUpstream,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            GatewayError::Store(e) => {
                tracing::error!(error = %e, "State store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Rate limit check failed"}),
                )
            }
            GatewayError::Database(e) => {
                tracing::error!(error = %e, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal Server Error"}),
                )
            }
            GatewayError::AuthUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "Authentication unavailable"}),
            ),
            GatewayError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Invalid API key"}),
            ),
            GatewayError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Invalid or expired token"}),
            ),
            GatewayError::RateLimited {
                tier,
                limit,
                retry_after,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Rate limit exceeded",
                    "tier": tier,
                    "limit": limit,
                    "retry_after": retry_after,
                }),
            ),
            GatewayError::NoHealthyUpstream => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "No healthy backend servers available"}),
            ),
            GatewayError::CircuitOpen => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "Service temporarily unavailable"}),
            ),
            GatewayError::Upstream(e) => {
                tracing::error!(error = %e, "Upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({"error": "Upstream request failed"}),
                )
            }
            GatewayError::Json(_) | GatewayError::Config(_) | GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Internal Server Error"}),
            ),
            GatewayError::NotFound(what) => {
                (StatusCode::NOT_FOUND, json!({"error": what}))
            }
        };

        (status, Json(body)).into_response()
    }
}
