//! Token-bucket rate limiting.
//!
//! Each subject's bucket is a small serialized record in the shared store:
//! current token count and the last refill time. Tokens accrue continuously
//! at the refill rate up to the bucket capacity, so sustained throughput is
//! bounded by the rate while short bursts can spend the full capacity.
//!
//! The read-modify-write against the store is not atomic: two concurrent
//! requests for one subject may both observe `tokens >= 1` before either
//! writes back. The admitted overshoot is bounded by the number of racing
//! requests; callers that cannot tolerate it need a server-side script.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::ratelimit::{Decision, RateLimiter};
use crate::store::StateStore;

/// How long an idle bucket record lingers before TTL eviction.
const STATE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize, Deserialize)]
struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

pub struct TokenBucketLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    capacity: u32,
    refill_rate: u32,
}

impl TokenBucketLimiter {
    /// `refill_rate` is tokens per second.
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        capacity: u32,
        refill_rate: u32,
    ) -> Self {
        Self {
            store,
            clock,
            capacity,
            refill_rate: refill_rate.max(1),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn allow(&self, subject: &str) -> Result<Decision> {
        let key = format!("ratelimit:bucket:{}", subject);
        let now = self.clock.now();

        let mut state = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(BucketState {
                tokens: self.capacity as f64,
                last_refill: now,
            }),
            None => BucketState {
                tokens: self.capacity as f64,
                last_refill: now,
            },
        };

        let elapsed = (now - state.last_refill)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        state.tokens =
            (state.tokens + elapsed * self.refill_rate as f64).min(self.capacity as f64);
        state.last_refill = now;

        let permitted = state.tokens >= 1.0;
        if permitted {
            state.tokens -= 1.0;
        }

        let serialized = serde_json::to_string(&state)?;
        self.store.set_with_ttl(&key, &serialized, STATE_TTL).await?;

        let rate = self.refill_rate as f64;
        // A denied caller only has to wait for one token to accrue, not for
        // the whole bucket to refill.
        let next_permit_at = if permitted {
            now
        } else {
            let to_next = (1.0 - state.tokens).max(0.0) / rate;
            now + chrono::Duration::milliseconds((to_next * 1000.0).ceil() as i64)
        };

        let to_full = (self.capacity as f64 - state.tokens) / rate;
        Ok(Decision {
            permitted,
            limit: self.capacity,
            remaining: state.tokens.floor().max(0.0) as u32,
            next_permit_at,
            reset_at: now + chrono::Duration::milliseconds((to_full * 1000.0) as i64),
        })
    }

    fn limit(&self) -> u32 {
        self.capacity
    }

    fn window(&self) -> Duration {
        // Time to refill an empty bucket.
        Duration::from_secs((self.capacity / self.refill_rate).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn limiter(capacity: u32, rate: u32) -> (Arc<ManualClock>, TokenBucketLimiter) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        (
            clock.clone(),
            TokenBucketLimiter::new(store, clock, capacity, rate),
        )
    }

    #[tokio::test]
    async fn burst_spends_the_full_capacity() {
        let (_, limiter) = limiter(5, 1);

        for _ in 0..5 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }
        let denied = limiter.allow("s").await.unwrap();
        assert!(!denied.permitted);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn refill_restores_tokens_at_the_configured_rate() {
        let (clock, limiter) = limiter(60, 10);

        for _ in 0..60 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }
        assert!(!limiter.allow("s").await.unwrap().permitted);

        // 3 seconds at 10 tokens/s buys ~30 more admissions.
        clock.advance(Duration::from_secs(3));
        let mut admitted = 0;
        for _ in 0..35 {
            if limiter.allow("s").await.unwrap().permitted {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 30);
    }

    #[tokio::test]
    async fn tokens_never_exceed_capacity() {
        let (clock, limiter) = limiter(3, 1);

        limiter.allow("s").await.unwrap();
        // A long idle period refills to capacity, not beyond.
        clock.advance(Duration::from_secs(600));
        let d = limiter.allow("s").await.unwrap();
        assert!(d.permitted);
        assert_eq!(d.remaining, 2);
    }

    #[tokio::test]
    async fn reset_at_reflects_time_to_full() {
        let (_, limiter) = limiter(10, 2);

        let d = limiter.allow("s").await.unwrap();
        // One token spent, refill at 2/s: full again in 500ms.
        assert_eq!((d.reset_at.timestamp_millis()), 500);
    }

    #[tokio::test]
    async fn denied_requests_point_at_the_next_token() {
        let (_, limiter) = limiter(60, 10);

        for _ in 0..60 {
            assert!(limiter.allow("s").await.unwrap().permitted);
        }

        let denied = limiter.allow("s").await.unwrap();
        assert!(!denied.permitted);
        // The next token accrues in 1/rate seconds; full refill is further out.
        assert_eq!(denied.next_permit_at.timestamp_millis(), 100);
        assert_eq!(denied.reset_at.timestamp_millis(), 6_000);
    }
}
