//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher gets healthy targets from the health checker
//!     → Strategy::next picks one:
//!         - round_robin.rs (mutexed monotone counter)
//!         - random.rs (seeded generator)
//!         - least_conn.rs (fewest active requests, RAII-tracked)
//!     → Dispatcher forwards to the chosen target
//! ```
//!
//! # Design Decisions
//! - Strategies only ever see the healthy subset
//! - Least-connections counts are released by a guard on every exit path,
//!   including panics
//! - No cross-request ordering promise beyond round robin's cyclic sequence

pub mod least_conn;
pub mod random;
pub mod round_robin;

use crate::error::{GatewayError, Result};

pub use least_conn::{ConnectionGuard, LeastConnections};
pub use random::Random;
pub use round_robin::RoundRobin;

/// A target-selection strategy. Safe under concurrent invocation.
pub trait Strategy: Send + Sync {
    /// Pick one of `targets`. `None` iff the slice is empty.
    fn next(&self, targets: &[String]) -> Option<String>;

    fn name(&self) -> &'static str;

    /// Register an in-flight request against `target`. Strategies that do
    /// not count connections return `None`.
    fn track(&self, _target: &str) -> Option<ConnectionGuard> {
        None
    }
}

/// Build a strategy by its configuration name.
pub fn new_strategy(name: &str) -> Result<Box<dyn Strategy>> {
    match name {
        "round_robin" | "" => Ok(Box::new(RoundRobin::new())),
        "random" => Ok(Box::new(Random::new())),
        "least_connections" => Ok(Box::new(LeastConnections::new())),
        other => Err(GatewayError::Config(format!(
            "unknown load balancing strategy: {}",
            other
        ))),
    }
}
