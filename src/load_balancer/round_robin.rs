//! Round-robin load balancing.

use std::sync::Mutex;

use crate::load_balancer::Strategy;

/// Rotates through targets with a monotone counter. The sequence observed by
/// a single caller is cyclic; interleaving across tasks is unspecified.
#[derive(Debug, Default)]
pub struct RoundRobin {
    current: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn next(&self, targets: &[String]) -> Option<String> {
        if targets.is_empty() {
            return None;
        }

        let mut current = self.current.lock().expect("round robin mutex poisoned");
        let target = targets[*current % targets.len()].clone();
        *current = current.wrapping_add(1);

        Some(target)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://backend-{}", i)).collect()
    }

    #[test]
    fn cycles_in_order() {
        let lb = RoundRobin::new();
        let targets = targets(3);

        let picks: Vec<String> = (0..6).map(|_| lb.next(&targets).unwrap()).collect();
        assert_eq!(picks[0], picks[3]);
        assert_eq!(picks[1], picks[4]);
        assert_eq!(picks[2], picks[5]);
        assert_ne!(picks[0], picks[1]);
    }

    #[test]
    fn distributes_evenly() {
        let lb = RoundRobin::new();
        let targets = targets(3);

        let mut counts = std::collections::HashMap::new();
        for _ in 0..12 {
            *counts.entry(lb.next(&targets).unwrap()).or_insert(0u32) += 1;
        }
        assert!(counts.values().all(|&c| c == 4));
    }

    #[test]
    fn adapts_when_the_candidate_set_shrinks() {
        let lb = RoundRobin::new();
        let all = targets(3);
        let fewer = targets(2);

        lb.next(&all);
        lb.next(&all);
        // Continues cycling over whatever candidates it is handed.
        assert!(fewer.contains(&lb.next(&fewer).unwrap()));
    }
}
