//! Request dispatch to upstream targets.
//!
//! # Data Flow
//! ```text
//! matched route
//!     → health checker (healthy subset; empty → 503)
//!     → load balancing strategy (pick target, track connection)
//!     → circuit breaker call:
//!         rewrite scheme/authority/forwarding headers
//!         stream request to the target
//!         5xx or transport error → recorded as breaker failure
//!     → response (X-Backend-Server attached) streamed back
//! ```
//!
//! # Design Decisions
//! - Upstream 5xx responses pass through to the client but count against
//!   the breaker; only transport errors are replaced (502)
//! - Bodies stream both ways; the status code is known before the body, so
//!   no buffering is needed to inform the breaker

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderValue, HOST};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{Request, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::clock::Clock;
use crate::config::{CircuitBreakerConfig, HealthCheckConfig};
use crate::error::GatewayError;
use crate::health::HealthChecker;
use crate::load_balancer::{new_strategy, Strategy};
use crate::resilience::{BreakerError, CircuitBreaker};

/// Why a forwarded call failed, as seen by the circuit breaker.
enum ForwardError {
    /// The upstream answered with a 5xx; the response still goes to the client.
    UpstreamStatus(Box<Response>),
    Transport(String),
}

/// Per-route dispatcher composing health checking, load balancing and
/// circuit breaking around the proxied call.
pub struct RouteProxy {
    route: String,
    checker: Arc<HealthChecker>,
    breaker: Arc<CircuitBreaker>,
    strategy: Box<dyn Strategy>,
    origins: HashMap<String, (Scheme, Authority)>,
    client: Client<HttpConnector, Body>,
}

impl RouteProxy {
    pub fn new(
        route: String,
        targets: Vec<String>,
        health_config: &HealthCheckConfig,
        breaker_config: &CircuitBreakerConfig,
        strategy_name: &str,
        client: Client<HttpConnector, Body>,
        clock: Arc<dyn Clock>,
    ) -> crate::error::Result<Self> {
        let mut origins = HashMap::new();
        for target in &targets {
            let uri: Uri = target.parse().map_err(|_| {
                GatewayError::Config(format!("invalid target URL '{}'", target))
            })?;
            let scheme = uri.scheme().cloned().unwrap_or(Scheme::HTTP);
            let authority = uri.authority().cloned().ok_or_else(|| {
                GatewayError::Config(format!("target URL '{}' has no authority", target))
            })?;
            origins.insert(target.clone(), (scheme, authority));
        }

        Ok(Self {
            route,
            checker: Arc::new(HealthChecker::new(targets, health_config, clock.clone())),
            breaker: Arc::new(CircuitBreaker::with_clock(breaker_config, clock)),
            strategy: new_strategy(strategy_name)?,
            origins,
            client,
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn checker(&self) -> &Arc<HealthChecker> {
        &self.checker
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Forward one request to a healthy target.
    pub async fn handle(&self, mut request: Request<Body>, client_ip: &str) -> Response {
        let healthy = self.checker.healthy_targets();
        if healthy.is_empty() {
            tracing::warn!(route = %self.route, "No healthy targets available");
            return GatewayError::NoHealthyUpstream.into_response();
        }

        let Some(target) = self.strategy.next(&healthy) else {
            return GatewayError::NoHealthyUpstream.into_response();
        };

        // Held for the whole dispatch so least-connections counts drain on
        // every exit path.
        let _guard = self.strategy.track(&target);

        let Some((scheme, authority)) = self.origins.get(&target) else {
            tracing::error!(route = %self.route, target = %target, "Target missing from origin map");
            return GatewayError::Internal("unknown target".to_string()).into_response();
        };

        if let Err(response) = self.rewrite(&mut request, scheme, authority, client_ip) {
            return response;
        }

        let client = self.client.clone();
        let result = self
            .breaker
            .call(move || async move {
                match client.request(request).await {
                    Ok(response) if response.status().is_server_error() => {
                        let (parts, body) = response.into_parts();
                        let response = Response::from_parts(parts, Body::new(body));
                        Err(ForwardError::UpstreamStatus(Box::new(response)))
                    }
                    Ok(response) => {
                        let (parts, body) = response.into_parts();
                        Ok(Response::from_parts(parts, Body::new(body)))
                    }
                    Err(e) => Err(ForwardError::Transport(e.to_string())),
                }
            })
            .await;

        match result {
            Ok(mut response) => {
                set_backend_header(&mut response, &target);
                response
            }
            Err(BreakerError::Open) => {
                tracing::warn!(route = %self.route, "Circuit breaker open, rejecting");
                crate::observability::metrics::record_circuit_open(&self.route);
                GatewayError::CircuitOpen.into_response()
            }
            Err(BreakerError::Inner(ForwardError::UpstreamStatus(response))) => {
                let mut response = *response;
                set_backend_header(&mut response, &target);
                response
            }
            Err(BreakerError::Inner(ForwardError::Transport(e))) => {
                GatewayError::Upstream(e).into_response()
            }
        }
    }

    /// Point the request at the chosen target and stamp forwarding headers.
    fn rewrite(
        &self,
        request: &mut Request<Body>,
        scheme: &Scheme,
        authority: &Authority,
        client_ip: &str,
    ) -> Result<(), Response> {
        let original_host = request
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut parts = request.uri().clone().into_parts();
        parts.scheme = Some(scheme.clone());
        parts.authority = Some(authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }

        match Uri::from_parts(parts) {
            Ok(uri) => *request.uri_mut() = uri,
            Err(_) => {
                return Err(
                    GatewayError::Internal("URI rewrite failed".to_string()).into_response()
                )
            }
        }

        let headers = request.headers_mut();
        if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
            headers.insert(HOST, value);
        }
        if let Some(host) = original_host {
            if let Ok(value) = HeaderValue::from_str(&host) {
                headers.insert("X-Forwarded-Host", value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(client_ip) {
            headers.insert("X-Forwarded-For", value);
        }

        Ok(())
    }
}

fn set_backend_header(response: &mut Response, target: &str) {
    if let Ok(value) = HeaderValue::from_str(target) {
        response.headers_mut().insert("X-Backend-Server", value);
    }
}
