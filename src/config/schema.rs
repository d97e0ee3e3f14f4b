//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (port, environment tag).
    pub server: ServerConfig,

    /// Shared state store connection.
    pub redis: RedisConfig,

    /// Durable credential registry / request log database.
    pub database: DatabaseConfig,

    /// Admin bearer token settings.
    pub jwt: JwtConfig,

    /// Proxied services: path prefix -> upstream targets.
    pub services: Vec<ServiceConfig>,

    /// Rate limit tiers assignable to API keys.
    pub tiers: Vec<TierConfig>,

    /// Upstream health probing.
    pub health_check: HealthCheckConfig,

    /// Per-route circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Load balancing strategy.
    pub load_balancer: LoadBalancerConfig,

    /// Request timeout budget.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on (e.g. "8080").
    pub port: String,

    /// Environment tag ("development" or "production").
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: "8080".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Shared state store (Redis) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form the redis client expects.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// Durable registry connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    pub url: String,
}

/// Admin bearer token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 signing secret.
    pub secret: String,

    /// Token lifetime in hours.
    pub expiry_hours: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expiry_hours: 24,
        }
    }
}

/// A proxied service: requests under `path` go to one of `targets`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Path prefix the service is mounted under (e.g. "/api/users").
    pub path: String,

    /// Upstream target URLs, in configuration order.
    pub targets: Vec<String>,
}

/// A named quota policy assignable to API keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierConfig {
    pub name: String,

    pub requests_per_minute: u32,

    /// Optional hourly cap; 0 disables the hourly guard.
    #[serde(default)]
    pub requests_per_hour: u32,

    /// One of "fixed_window", "sliding_window", "token_bucket".
    pub algorithm: String,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Path to probe on each target.
    pub path: String,

    /// Seconds between probe rounds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failures before a target is marked unhealthy.
    pub max_failures: u32,

    /// Whether targets start out healthy before the first probe.
    pub assume_healthy_on_start: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval_secs: 10,
            timeout_secs: 5,
            max_failures: 3,
            assume_healthy_on_start: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub max_failures: u32,

    /// Seconds the circuit stays open before a half-open probe.
    pub timeout_secs: u64,

    /// Successes needed in half-open to close.
    pub half_open_success: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout_secs: 30,
            half_open_success: 1,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// One of "round_robin", "random", "least_connections".
    pub strategy: String,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            strategy: "round_robin".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time budget for a request, inherited by outbound calls.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Look up a tier by name.
    pub fn find_tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }
}
