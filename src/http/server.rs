//! HTTP server setup and request routing.
//!
//! # Responsibilities
//! - Build the Axum router with the fixed middleware chain
//! - Create the per-route dispatchers and their health checkers
//! - Route non-admin traffic to the matching dispatcher by path prefix
//! - Serve `/health` with dependency pings
//! - Run with graceful shutdown

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::admin_router;
use crate::auth::TokenVerifier;
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::middleware::{access_log, assign_request_id, enforce_rate_limit, resolve_api_key};
use crate::observability::RequestLogSink;
use crate::proxy::RouteProxy;
use crate::registry::{CredentialRegistry, CredentialStore};
use crate::store::StateStore;

/// How long dependency pings may take on `/health`.
const PING_DEADLINE: Duration = Duration::from_secs(2);

/// Shared application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<dyn StateStore>,
    pub registry: Arc<CredentialRegistry>,
    pub proxies: Arc<HashMap<String, Arc<RouteProxy>>>,
    pub verifier: Arc<TokenVerifier>,
    pub sink: RequestLogSink,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

/// The gateway's HTTP server.
pub struct GatewayServer {
    state: AppState,
    router: Router,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn StateStore>,
        credentials: Arc<dyn CredentialStore>,
        sink: RequestLogSink,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Arc::new(CredentialRegistry::new(
            store.clone(),
            credentials,
            clock.clone(),
        ));

        // One pooled client shared by every dispatcher.
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let mut proxies = HashMap::new();
        for service in &config.services {
            let proxy = RouteProxy::new(
                service.path.clone(),
                service.targets.clone(),
                &config.health_check,
                &config.circuit_breaker,
                &config.load_balancer.strategy,
                client.clone(),
                clock.clone(),
            )?;
            tracing::info!(
                path = %service.path,
                targets = service.targets.len(),
                "Registered proxy route"
            );
            proxies.insert(service.path.clone(), Arc::new(proxy));
        }

        let verifier = Arc::new(TokenVerifier::new(&config.jwt.secret));
        let started_at = clock.now();

        let state = AppState {
            config: Arc::new(config),
            store,
            registry,
            proxies: Arc::new(proxies),
            verifier,
            sink,
            clock,
            started_at,
        };

        let router = build_router(state.clone());

        Ok(Self { state, router })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the shutdown signal fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        for proxy in self.state.proxies.values() {
            proxy.checker().clone().start(shutdown.resubscribe());
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Assemble the router. Layer order matters: the last layer added is the
/// outermost, so the chain reads bottom-up as
/// recovery → request-id → access log → CORS → credentials → rate limit.
fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

    // Credential resolution and the rate check guard admin and proxied
    // traffic. `/health` stays outside them: it must still answer (with a
    // 503 body) when the shared store is the thing that is down.
    let guarded = Router::new()
        .nest("/admin", admin_router(&state))
        .fallback(dispatch_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(guarded)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn_with_state(state.clone(), access_log))
        .layer(middleware::from_fn(assign_request_id))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health: ping the shared store and the credential registry.
async fn health_handler(State(state): State<AppState>) -> Response {
    let store_ok = match state.store.ping(PING_DEADLINE).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "State store health check failed");
            false
        }
    };
    let registry_ok = match state.registry.ping(PING_DEADLINE).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Registry health check failed");
            false
        }
    };

    let healthy = store_ok && registry_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "api-gateway",
            "timestamp": state.clock.now().timestamp(),
            "checks": {
                "store": store_ok,
                "registry": registry_ok,
            },
        })),
    )
        .into_response()
}

/// Route anything that is not `/health` or `/admin/*` to the dispatcher
/// whose configured prefix matches the path most specifically.
async fn dispatch_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let path = request.uri().path().to_string();

    let matched = state
        .proxies
        .iter()
        .filter(|(prefix, _)| {
            path == **prefix || path.starts_with(&format!("{}/", prefix))
        })
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, proxy)| proxy.clone());

    match matched {
        Some(proxy) => proxy.handle(request, &addr.ip().to_string()).await,
        None => {
            tracing::debug!(path = %path, "No route matched");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "No matching route found"})),
            )
                .into_response()
        }
    }
}
