//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Environment variables override individual fields (PORT, REDIS_HOST,
//!   REDIS_PASSWORD, DATABASE_URL, JWT_SECRET, ENVIRONMENT)

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, DatabaseConfig, GatewayConfig, HealthCheckConfig, JwtConfig,
    LoadBalancerConfig, ObservabilityConfig, RedisConfig, ServerConfig, ServiceConfig, TierConfig,
    TimeoutConfig,
};
