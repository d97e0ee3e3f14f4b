//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML config file, apply environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment variables override individual config fields, so deployments
/// can keep secrets out of the config file.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(port) = std::env::var("PORT") {
        if !port.is_empty() {
            config.server.port = port;
        }
    }
    if let Ok(env) = std::env::var("ENVIRONMENT") {
        if !env.is_empty() {
            config.server.environment = env;
        }
    }
    if let Ok(host) = std::env::var("REDIS_HOST") {
        if !host.is_empty() {
            config.redis.host = host;
        }
    }
    if let Ok(password) = std::env::var("REDIS_PASSWORD") {
        if !password.is_empty() {
            config.redis.password = password;
        }
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.is_empty() {
            config.database.url = url;
        }
    }
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        if !secret.is_empty() {
            config.jwt.secret = secret;
        }
    }
}
