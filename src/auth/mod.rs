//! Admin bearer-token validation.
//!
//! Admin routes require `Authorization: Bearer <jwt>`. Tokens are HS256,
//! signed with the configured secret; issuing them (login) is handled by an
//! external collaborator, so the gateway only verifies.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Claims carried by an admin token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Validates admin bearer tokens.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AdminClaims> {
        let data = decode::<AdminClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| GatewayError::InvalidToken)?;
        Ok(data.claims)
    }
}

/// Sign an admin token. The gateway itself never issues tokens on the
/// request path; this exists for operators and the test suite.
pub fn issue_token(
    secret: &str,
    sub: &str,
    email: &str,
    role: &str,
    expires_at: DateTime<Utc>,
) -> Result<String> {
    let claims = AdminClaims {
        sub: sub.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expires_at.timestamp(),
        iat: Utc::now().timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| GatewayError::Internal(format!("failed to sign token: {}", e)))
}

/// Middleware guarding the admin router.
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return GatewayError::InvalidToken.into_response(),
    };

    match verifier.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn round_trip() {
        let token = issue_token(
            "secret",
            "user-1",
            "ops@example.com",
            "admin",
            Utc::now() + Duration::hours(1),
        )
        .unwrap();

        let claims = TokenVerifier::new("secret").verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token(
            "secret",
            "user-1",
            "ops@example.com",
            "admin",
            Utc::now() + Duration::hours(1),
        )
        .unwrap();

        assert!(TokenVerifier::new("other").verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let token = issue_token(
            "secret",
            "user-1",
            "ops@example.com",
            "admin",
            Utc::now() - Duration::hours(2),
        )
        .unwrap();

        assert!(TokenVerifier::new("secret").verify(&token).is_err());
    }
}
