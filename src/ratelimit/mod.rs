//! Distributed rate limiting.
//!
//! # Data Flow
//! ```text
//! request subject (API key id or client IP)
//!     → tier config selects algorithm + limit
//!     → fixed_window.rs | sliding_window.rs | token_bucket.rs
//!     → shared state store (atomic counters / sorted sets / KV)
//!     → Decision {permitted, remaining, reset_at}
//! ```
//!
//! # Design Decisions
//! - Limiter state lives only in the shared store, so limits hold across
//!   gateway replicas
//! - Store failures propagate as errors; the pipeline fails closed (500),
//!   never an implicit permit
//! - `remaining` is a best-effort snapshot, not monotonic under concurrency

pub mod fixed_window;
pub mod sliding_window;
pub mod token_bucket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::Result;
use crate::store::StateStore;

pub use fixed_window::FixedWindowLimiter;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

/// Outcome of a single admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub permitted: bool,

    /// The configured limit, for response headers.
    pub limit: u32,

    /// Permits left in the current window; best-effort snapshot.
    pub remaining: u32,

    /// When the limiter next admits a single request. Drives `Retry-After`;
    /// never further out than one window.
    pub next_permit_at: DateTime<Utc>,

    /// When the limiter next permits at full capacity.
    pub reset_at: DateTime<Utc>,
}

/// One admission-control algorithm. All three implementations share this
/// capability and are selected per tier.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check and consume one permit for `subject`.
    async fn allow(&self, subject: &str) -> Result<Decision>;

    fn limit(&self) -> u32;

    fn window(&self) -> Duration;
}

/// Build the limiter a tier asks for. Unknown algorithm labels fall back to
/// the fixed window, the cheapest of the three.
pub fn for_tier(
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    algorithm: &str,
    limit: u32,
    window: Duration,
) -> Box<dyn RateLimiter> {
    match algorithm {
        "sliding_window" => Box::new(SlidingWindowLimiter::new(store, clock, limit, window)),
        "token_bucket" => {
            let rate = (limit as u64 / window.as_secs().max(1)).max(1) as u32;
            Box::new(TokenBucketLimiter::new(store, clock, limit, rate))
        }
        _ => Box::new(FixedWindowLimiter::new(store, clock, limit, window)),
    }
}
