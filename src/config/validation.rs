//! Configuration validation logic.

use crate::config::schema::GatewayConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

const ALGORITHMS: [&str; 3] = ["fixed_window", "sliding_window", "token_bucket"];
const STRATEGIES: [&str; 3] = ["round_robin", "random", "least_connections"];

/// Validate a GatewayConfig for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port.is_empty() {
        errors.push(ValidationError("server.port is required".to_string()));
    }

    if config.redis.host.is_empty() {
        errors.push(ValidationError("redis.host is required".to_string()));
    }

    if config.jwt.secret.is_empty() {
        errors.push(ValidationError("jwt.secret is required".to_string()));
    }

    if config.services.is_empty() {
        errors.push(ValidationError(
            "at least one service must be configured".to_string(),
        ));
    }

    for (i, svc) in config.services.iter().enumerate() {
        if svc.path.is_empty() {
            errors.push(ValidationError(format!("service {}: path is required", i)));
        } else if !svc.path.starts_with('/') {
            errors.push(ValidationError(format!(
                "service {}: path '{}' must start with '/'",
                i, svc.path
            )));
        }
        if svc.targets.is_empty() {
            errors.push(ValidationError(format!(
                "service {}: at least one target is required",
                i
            )));
        }
    }

    for tier in &config.tiers {
        if tier.requests_per_minute == 0 {
            errors.push(ValidationError(format!(
                "tier '{}': requests_per_minute must be > 0",
                tier.name
            )));
        }
        if !ALGORITHMS.contains(&tier.algorithm.as_str()) {
            errors.push(ValidationError(format!(
                "tier '{}': unknown algorithm '{}'",
                tier.name, tier.algorithm
            )));
        }
    }

    if !STRATEGIES.contains(&config.load_balancer.strategy.as_str()) {
        errors.push(ValidationError(format!(
            "load_balancer.strategy '{}' is not one of {:?}",
            config.load_balancer.strategy, STRATEGIES
        )));
    }

    if config.health_check.max_failures == 0 {
        errors.push(ValidationError(
            "health_check.max_failures must be > 0".to_string(),
        ));
    }

    if config.circuit_breaker.max_failures == 0 {
        errors.push(ValidationError(
            "circuit_breaker.max_failures must be > 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.jwt.secret = "test-secret".into();
        config.services.push(ServiceConfig {
            path: "/api/users".into(),
            targets: vec!["http://127.0.0.1:9001".into()],
        });
        config.tiers.push(TierConfig {
            name: "basic".into(),
            requests_per_minute: 60,
            requests_per_hour: 1000,
            algorithm: "fixed_window".into(),
        });
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_jwt_secret() {
        let mut config = valid_config();
        config.jwt.secret = String::new();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("jwt.secret")));
    }

    #[test]
    fn test_empty_services() {
        let mut config = valid_config();
        config.services.clear();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("at least one service")));
    }

    #[test]
    fn test_service_without_targets() {
        let mut config = valid_config();
        config.services[0].targets.clear();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("at least one target")));
    }

    #[test]
    fn test_unknown_algorithm() {
        let mut config = valid_config();
        config.tiers[0].algorithm = "leaky_bucket".into();
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("unknown algorithm")));
    }

    #[test]
    fn test_empty_port_and_redis_host() {
        let mut config = valid_config();
        config.server.port = String::new();
        config.redis.host = String::new();
        let errs = validate_config(&config).unwrap_err();
        assert_eq!(
            errs.iter()
                .filter(|e| e.0.contains("server.port") || e.0.contains("redis.host"))
                .count(),
            2
        );
    }
}
