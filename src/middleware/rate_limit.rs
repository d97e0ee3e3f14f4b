//! Tiered rate-limit enforcement.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::middleware::api_key::AuthedKey;
use crate::observability::metrics;
use crate::ratelimit::{for_tier, Decision};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Fallback when no tiers are configured at all.
const DEFAULT_LIMIT: u32 = 60;

struct ResolvedTier {
    name: String,
    requests_per_minute: u32,
    requests_per_hour: u32,
    algorithm: String,
    authenticated: bool,
}

/// Enforce the subject's quota before dispatch. Quota headers are attached
/// to permitted responses as well as 429s.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let authed = request.extensions().get::<AuthedKey>().cloned();

    let (subject, tier) = match &authed {
        Some(key) => (key.id.to_string(), resolve_tier(&state, Some(&key.tier))),
        None => (addr.ip().to_string(), resolve_tier(&state, None)),
    };

    // The hourly cap is a cheap fixed-window guard ahead of the tier's own
    // algorithm; its key space is disjoint from the minute window's.
    if tier.requests_per_hour > 0 {
        let hourly = for_tier(
            state.store.clone(),
            state.clock.clone(),
            "fixed_window",
            tier.requests_per_hour,
            HOUR,
        );
        let hourly_subject = format!("{}:hourly", subject);
        match hourly.allow(&hourly_subject).await {
            Ok(decision) if !decision.permitted => {
                return rate_limited_response(&tier, &decision, state.clock.now());
            }
            Ok(_) => {}
            Err(e) => return e.into_response(),
        }
    }

    let limiter = for_tier(
        state.store.clone(),
        state.clock.clone(),
        &tier.algorithm,
        tier.requests_per_minute,
        MINUTE,
    );

    let decision = match limiter.allow(&subject).await {
        Ok(decision) => decision,
        // Store failure is fail-closed: a 500, never an implicit permit.
        Err(e) => return e.into_response(),
    };

    if !decision.permitted {
        tracing::warn!(
            subject = %subject,
            tier = %tier.name,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        return rate_limited_response(&tier, &decision, state.clock.now());
    }

    let mut response = next.run(request).await;
    apply_quota_headers(&mut response, &tier, &decision);
    response
}

fn resolve_tier(state: &AppState, tier_name: Option<&str>) -> ResolvedTier {
    let config = match tier_name {
        Some(name) => state.config.find_tier(name),
        // Anonymous traffic is measured against the first configured tier,
        // keyed by client IP.
        None => state.config.tiers.first(),
    };

    match config {
        Some(tier) => ResolvedTier {
            name: tier.name.clone(),
            requests_per_minute: tier.requests_per_minute,
            requests_per_hour: tier.requests_per_hour,
            algorithm: tier.algorithm.clone(),
            authenticated: tier_name.is_some(),
        },
        None => ResolvedTier {
            name: tier_name.unwrap_or("default").to_string(),
            requests_per_minute: DEFAULT_LIMIT,
            requests_per_hour: 0,
            algorithm: "fixed_window".to_string(),
            authenticated: tier_name.is_some(),
        },
    }
}

fn apply_quota_headers(response: &mut Response, tier: &ResolvedTier, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from(decision.reset_at.timestamp()),
    );
    if tier.authenticated {
        if let Ok(value) = HeaderValue::from_str(&tier.name) {
            headers.insert("X-RateLimit-Tier", value);
        }
    }
}

fn rate_limited_response(
    tier: &ResolvedTier,
    decision: &Decision,
    now: DateTime<Utc>,
) -> Response {
    metrics::record_rate_limited(&tier.name);

    // Seconds until the next single permit, not until full capacity: for the
    // token bucket those differ, and only the former fits inside the window.
    let retry_after = (decision.next_permit_at - now).num_seconds().max(0);
    let mut response = GatewayError::RateLimited {
        tier: tier.name.clone(),
        limit: decision.limit,
        retry_after,
    }
    .into_response();

    apply_quota_headers(&mut response, tier, decision);
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}
