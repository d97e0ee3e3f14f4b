//! Least-connections load balancing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::load_balancer::Strategy;

type Counts = Arc<Mutex<HashMap<String, usize>>>;

/// Selects the target with the fewest in-flight requests.
/// Ties go to the first candidate in the slice (stability).
#[derive(Debug, Default)]
pub struct LeastConnections {
    connections: Counts,
}

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn count(&self, target: &str) -> usize {
        *self
            .connections
            .lock()
            .expect("least connections mutex poisoned")
            .get(target)
            .unwrap_or(&0)
    }
}

impl Strategy for LeastConnections {
    fn next(&self, targets: &[String]) -> Option<String> {
        if targets.is_empty() {
            return None;
        }

        let connections = self
            .connections
            .lock()
            .expect("least connections mutex poisoned");

        targets
            .iter()
            .min_by_key(|t| connections.get(*t).copied().unwrap_or(0))
            .cloned()
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }

    fn track(&self, target: &str) -> Option<ConnectionGuard> {
        self.connections
            .lock()
            .expect("least connections mutex poisoned")
            .entry(target.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);

        Some(ConnectionGuard {
            connections: self.connections.clone(),
            target: target.to_string(),
        })
    }
}

/// RAII guard for an in-flight request. Dropping it releases the connection
/// count, so the release runs on every termination path, panics included.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Counts,
    target: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut connections = self
            .connections
            .lock()
            .expect("least connections mutex poisoned");
        if let Some(count) = connections.get_mut(&self.target) {
            *count = count.saturating_sub(1);
        }
    }
}
