//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use api_gateway::clock::SystemClock;
use api_gateway::config::{GatewayConfig, ServiceConfig, TierConfig};
use api_gateway::http::AppState;
use api_gateway::observability::RequestLogSink;
use api_gateway::registry::MemoryCredentialStore;
use api_gateway::store::MemoryStore;
use api_gateway::{GatewayServer, ShutdownController};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Start a mock backend that answers every request with a fixed status/body.
/// Returns the address it is listening on.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (status, body.to_string()) }).await
}

/// Start a mock backend whose responses are computed per request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering.
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address that refuses connections (bound, then released).
pub async fn dead_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A gateway running against in-memory store and registry.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub shutdown: ShutdownController,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.signal();
    }
}

/// Minimal valid config for one service.
pub fn base_config(targets: Vec<SocketAddr>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.jwt.secret = JWT_SECRET.to_string();
    config.services.push(ServiceConfig {
        path: "/api/users".to_string(),
        targets: targets
            .into_iter()
            .map(|a| format!("http://{}", a))
            .collect(),
    });
    config.tiers.push(TierConfig {
        name: "basic".to_string(),
        requests_per_minute: 60,
        requests_per_hour: 0,
        algorithm: "sliding_window".to_string(),
    });
    config
}

/// Boot a gateway on an ephemeral port and wait until it accepts.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let credentials = Arc::new(MemoryCredentialStore::new());
    let sink = RequestLogSink::tracing_only(64);

    let server = GatewayServer::new(
        config,
        store.clone(),
        credentials.clone(),
        sink,
        clock,
    )
    .expect("gateway construction failed");
    let state = server.state().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = ShutdownController::new(Duration::from_secs(1));
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    wait_for_server(addr).await;

    TestGateway {
        addr,
        state,
        store,
        credentials,
        shutdown,
    }
}

async fn wait_for_server(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway at {} never came up", addr);
}

/// Plain client with pooling disabled so every request hits a fresh socket.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Bearer token accepted by the admin router.
pub fn admin_token() -> String {
    api_gateway::auth::issue_token(
        JWT_SECRET,
        "test-admin",
        "admin@example.com",
        "admin",
        chrono::Utc::now() + chrono::Duration::hours(1),
    )
    .unwrap()
}
