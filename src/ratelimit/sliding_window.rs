//! Sliding-window (log) rate limiting.
//!
//! Keeps a sorted set of admission timestamps per subject. Exact over any
//! window position, at the cost of one set entry per admitted request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::error::Result;
use crate::ratelimit::{Decision, RateLimiter};
use crate::store::StateStore;

pub struct SlidingWindowLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: Duration,
}

impl SlidingWindowLimiter {
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
impl RateLimiter for SlidingWindowLimiter {
    async fn allow(&self, subject: &str) -> Result<Decision> {
        let key = format!("ratelimit:sliding:{}", subject);
        let now = self.clock.now();
        let now_ns = now.timestamp_nanos_opt().unwrap_or(0);
        let window_ns = self.window.as_nanos() as i64;

        // Drop entries older than the window and count survivors, one round trip.
        let count = self
            .store
            .purge_and_count(&key, (now_ns - window_ns) as f64)
            .await?;

        let permitted = count < self.limit as u64;
        if permitted {
            self.store
                .zadd(&key, now_ns as f64, &now_ns.to_string())
                .await?;
            self.store.expire(&key, self.window).await?;
        }

        // The window frees a slot when its oldest surviving entry ages out.
        let reset_at = match self.store.zrange_oldest(&key).await? {
            Some(oldest) => {
                let oldest_ns: i64 = oldest.parse().unwrap_or(now_ns);
                chrono::DateTime::from_timestamp_nanos(oldest_ns)
                    + chrono::Duration::nanoseconds(window_ns)
            }
            None => now,
        };

        let used = count + u64::from(permitted);
        Ok(Decision {
            permitted,
            limit: self.limit,
            remaining: (self.limit as i64 - used as i64).max(0) as u32,
            // A slot frees as soon as the oldest entry ages out.
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

    fn limiter(limit: u32) -> (Arc<ManualClock>, SlidingWindowLimiter) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        (
            clock.clone(),
            SlidingWindowLimiter::new(store, clock, limit, Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn permits_up_to_limit_then_denies() {
        let (clock, limiter) = limiter(3);
        clock.advance(Duration::from_secs(1));

        for _ in 0..3 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }
        let denied = limiter.allow("s").await.unwrap();
        assert!(!denied.permitted);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn window_slides_rather_than_resets() {
        let (clock, limiter) = limiter(3);
        clock.advance(Duration::from_secs(1));

        // Two early admissions, one later.
        limiter.allow("s").await.unwrap();
        limiter.allow("s").await.unwrap();
        clock.advance(Duration::from_secs(30));
        limiter.allow("s").await.unwrap();
        assert!(!limiter.allow("s").await.unwrap().permitted);

        // 31s past the first two, they are still inside the window.
        clock.advance(Duration::from_secs(1));
        assert!(!limiter.allow("s").await.unwrap().permitted);

        // 61s past the first two, two slots free up; the 30s-old entry remains.
        clock.advance(Duration::from_secs(30));
        assert!(limiter.allow("s").await.unwrap().permitted);
        assert!(limiter.allow("s").await.unwrap().permitted);
        assert!(!limiter.allow("s").await.unwrap().permitted);
    }

    #[tokio::test]
    async fn reset_at_tracks_the_oldest_entry() {
        let (clock, limiter) = limiter(2);
        clock.advance(Duration::from_secs(10));

        let first = limiter.allow("s").await.unwrap();
        // Oldest entry is the one just admitted: resets one window later.
        assert_eq!(first.reset_at.timestamp(), 70);

        clock.advance(Duration::from_secs(5));
        let second = limiter.allow("s").await.unwrap();
        assert_eq!(second.reset_at.timestamp(), 70);
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let (clock, limiter) = limiter(3);
        clock.advance(Duration::from_secs(1));

        assert_eq!(limiter.allow("s").await.unwrap().remaining, 2);
        assert_eq!(limiter.allow("s").await.unwrap().remaining, 1);
        assert_eq!(limiter.allow("s").await.unwrap().remaining, 0);
    }
}
