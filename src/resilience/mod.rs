//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher call to an upstream:
//!     → circuit_breaker.rs (reject fast while the route is failing,
//!       probe after the open timeout, close on recovery)
//! ```
//!
//! # Design Decisions
//! - One breaker per route, shared by all tasks serving that route
//! - All state mutation happens inside the breaker's lock; callers only see
//!   the `call` combinator and read-only snapshots

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
