//! Per-route circuit breaker.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: probing whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      max_failures consecutive failures
//! Open → Half-Open:   first call after the open timeout elapses
//! Half-Open → Closed: half_open_success successful probes
//! Half-Open → Open:   any probe failure
//! ```
//!
//! The lock is held only to read-and-advance state and to record the
//! outcome, never across the awaited call itself.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Why a call did not produce the inner result.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without touching the upstream.
    Open,
    /// The call ran and failed; the failure has been recorded.
    Inner(E),
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_state_change: DateTime<Utc>,
}

/// Failure-tracking state machine protecting one route's upstreams.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    max_failures: u32,
    timeout: Duration,
    half_open_success: u32,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                last_state_change: clock.now(),
            }),
            max_failures: config.max_failures.max(1),
            timeout: Duration::seconds(config.timeout_secs.max(1) as i64),
            half_open_success: config.half_open_success.max(1),
            clock,
        }
    }

    /// Run `f` under breaker protection. Rejected calls return
    /// `BreakerError::Open` without executing `f`; executed calls have their
    /// outcome recorded before the result is returned.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().expect("breaker mutex poisoned");

            if state.state == CircuitState::Open {
                let elapsed_timeout = state
                    .last_failure_time
                    .map(|at| self.clock.now() - at > self.timeout)
                    .unwrap_or(true);

                if elapsed_timeout {
                    self.set_state(&mut state, CircuitState::HalfOpen);
                    state.success_count = 0;
                } else {
                    return Err(BreakerError::Open);
                }
            }
        }

        let result = f().await;

        let mut state = self.state.lock().expect("breaker mutex poisoned");
        match result {
            Ok(value) => {
                self.on_success(&mut state);
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&mut state);
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn on_failure(&self, state: &mut BreakerState) {
        state.failure_count += 1;
        state.last_failure_time = Some(self.clock.now());

        if state.state == CircuitState::HalfOpen {
            // Any failure during probing reopens the circuit.
            self.set_state(state, CircuitState::Open);
            state.success_count = 0;
        } else if state.failure_count >= self.max_failures {
            self.set_state(state, CircuitState::Open);
        }
    }

    fn on_success(&self, state: &mut BreakerState) {
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.half_open_success {
                    self.set_state(state, CircuitState::Closed);
                    state.failure_count = 0;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn set_state(&self, state: &mut BreakerState, new_state: CircuitState) {
        if state.state != new_state {
            tracing::info!(from = %state.state, to = %new_state, "Circuit breaker state change");
            state.state = new_state;
            state.last_state_change = self.clock.now();
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().expect("breaker mutex poisoned").state
    }

    /// Administrative reset: force Closed and zero the counters.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.last_state_change = self.clock.now();
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_time: state.last_failure_time,
            last_state_change: state.last_state_change,
        }
    }
}
