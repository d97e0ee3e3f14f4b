//! Gateway entry point.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_gateway::clock::SystemClock;
use api_gateway::config::load_config;
use api_gateway::observability::{migrate_request_logs, RequestLogSink};
use api_gateway::registry::PostgresCredentialStore;
use api_gateway::store::RedisStore;
use api_gateway::{GatewayServer, ShutdownController};

/// How long in-flight requests may drain after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const LOG_SINK_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(Path::new(&config_path))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("api_gateway={},tower_http=warn", config.observability.log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        environment = %config.server.environment,
        services = config.services.len(),
        tiers = config.tiers.len(),
        "api-gateway starting"
    );

    // Shared state store
    let store = Arc::new(RedisStore::connect(&config.redis.url()).await?);
    tracing::info!(host = %config.redis.host, "Connected to state store");

    // Durable registry + request log database
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database.url)
        .await?;
    tracing::info!("Connected to database");

    let credentials = Arc::new(PostgresCredentialStore::new(pool.clone()));
    credentials.migrate().await?;
    migrate_request_logs(&pool).await?;
    tracing::info!("Database migrations completed");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => api_gateway::observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let sink = RequestLogSink::postgres(pool, LOG_SINK_BUFFER);
    let clock = Arc::new(SystemClock);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    let server = GatewayServer::new(config, store, credentials, sink, clock)?;

    let shutdown = ShutdownController::new(SHUTDOWN_GRACE);
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    wait_for_signal().await;
    tracing::info!("Shutdown signal received, draining");

    if shutdown.drain(handle).await {
        tracing::info!("Shutdown complete");
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
