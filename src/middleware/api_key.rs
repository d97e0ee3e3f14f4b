//! API key resolution.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::http::server::AppState;

/// Identity attached to requests that presented a valid key. Inserted into
/// the request extensions for the rate limiter and mirrored onto the
/// response extensions for the access log.
#[derive(Debug, Clone)]
pub struct AuthedKey {
    pub id: Uuid,
    pub tier: String,
}

/// Resolve `X-API-Key` if present. Requests without the header continue
/// anonymously; an invalid or inactive key is a 401; a registry outage is a
/// 503 so clients can distinguish "try later" from "bad key".
pub async fn resolve_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(header) = request.headers().get("X-API-Key") else {
        return next.run(request).await;
    };

    let presented = match header.to_str() {
        Ok(value) => value.trim(),
        Err(_) => return GatewayError::InvalidCredential.into_response(),
    };

    match state.registry.validate(presented).await {
        Ok(Some(key)) => {
            state.registry.touch_last_used(key.id);

            let authed = AuthedKey {
                id: key.id,
                tier: key.tier,
            };
            request.extensions_mut().insert(authed.clone());

            let mut response = next.run(request).await;
            response.extensions_mut().insert(authed);
            response
        }
        Ok(None) => GatewayError::InvalidCredential.into_response(),
        Err(e) => e.into_response(),
    }
}
