//! Random load balancing.

use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::Strategy;

/// Uniform pick with a seeded generator.
#[derive(Debug)]
pub struct Random {
    rng: Mutex<SmallRng>,
}

impl Random {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for Random {
    fn next(&self, targets: &[String]) -> Option<String> {
        if targets.is_empty() {
            return None;
        }

        let index = self
            .rng
            .lock()
            .expect("random mutex poisoned")
            .gen_range(0..targets.len());
        Some(targets[index].clone())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
