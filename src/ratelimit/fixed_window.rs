//! Fixed-window rate limiting.
//!
//! One atomic counter per (subject, window index). The cheapest algorithm;
//! bursts of up to 2x the limit can straddle a window boundary by design.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::Result;
use crate::ratelimit::{Decision, RateLimiter};
use crate::store::StateStore;

pub struct FixedWindowLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            limit,
            window,
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self, subject: &str) -> Result<Decision> {
        let window_secs = self.window.as_secs().max(1) as i64;
        let now = self.clock.now();
        let window_index = now.timestamp() / window_secs;
        let key = format!("ratelimit:fixed:{}:{}", subject, window_index);

        let count = self.store.incr(&key).await?;
        if count == 1 {
            self.store.expire(&key, self.window).await?;
        }

        let reset_at = DateTime::<Utc>::from_timestamp((window_index + 1) * window_secs, 0)
            .unwrap_or(now);

        Ok(Decision {
            permitted: count <= self.limit as i64,
            limit: self.limit,
            remaining: (self.limit as i64 - count).max(0) as u32,
            // A denied subject is admitted again at the window boundary.
            next_permit_at: reset_at,
            reset_at,
        })
    }

    fn limit(&self) -> u32 {
        self.limit
    }

    fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn limiter(limit: u32) -> (Arc<ManualClock>, FixedWindowLimiter) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        (
            clock.clone(),
            FixedWindowLimiter::new(store, clock, limit, Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn permits_up_to_limit_then_denies() {
        let (_, limiter) = limiter(3);

        for i in 0..3 {
            let d = limiter.allow("s").await.unwrap();
            assert!(d.permitted, "request {i} should pass");
            assert_eq!(d.remaining, 2 - i);
        }

        let denied = limiter.allow("s").await.unwrap();
        assert!(!denied.permitted);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn window_rollover_resets_the_count() {
        let (clock, limiter) = limiter(3);

        for _ in 0..3 {
            limiter.allow("s").await.unwrap();
        }
        assert!(!limiter.allow("s").await.unwrap().permitted);

        clock.advance(Duration::from_secs(60));
        assert!(limiter.allow("s").await.unwrap().permitted);
    }

    #[tokio::test]
    async fn reset_at_is_the_next_window_boundary() {
        let (clock, limiter) = limiter(3);
        clock.advance(Duration::from_secs(42));

        let d = limiter.allow("s").await.unwrap();
        assert_eq!(d.reset_at.timestamp(), 60);
    }

    #[tokio::test]
    async fn adjacent_windows_admit_independently() {
        let (clock, limiter) = limiter(3);
        clock.advance(Duration::from_secs(59));

        for _ in 0..3 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }

        // One second later the boundary has passed; a fresh burst is allowed.
        clock.advance(Duration::from_secs(2));
        for _ in 0..3 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }
    }

    #[tokio::test]
    async fn subjects_are_isolated() {
        let (_, limiter) = limiter(1);
        assert!(limiter.allow("a").await.unwrap().permitted);
        assert!(!limiter.allow("a").await.unwrap().permitted);
        assert!(limiter.allow("b").await.unwrap().permitted);
    }
}
