//! Shared state store subsystem.
//!
//! # Data Flow
//! ```text
//! rate limiters ──┐
//!                 ├──▶ StateStore trait ──▶ redis.rs (production)
//! credential  ────┘                    └──▶ memory.rs (tests, dev mode)
//! cache
//! ```
//!
//! # Design Decisions
//! - Atomicity is only promised within a single operation or pipelined block
//! - Records may be evicted by TTL; durability is not required
//! - `purge_and_count` models the sliding-window prologue as one round trip

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Atomic counters, TTL'd key/value and score-ordered sets, shared across
/// gateway workers (and replicas, when backed by a real store).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Atomically increment the integer at `key`, returning the new value.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set the TTL on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Add `member` to the sorted set at `key` with the given score.
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()>;

    /// Remove members with score in `[lo, hi]`, returning how many went.
    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    async fn zcount(&self, key: &str, lo: f64, hi: f64) -> Result<u64>;

    /// The member with the lowest score, if any.
    async fn zrange_oldest(&self, key: &str) -> Result<Option<String>>;

    /// Remove members scored below `cutoff` and count the survivors, in a
    /// single pipelined round trip.
    async fn purge_and_count(&self, key: &str, cutoff: f64) -> Result<u64>;

    /// Liveness probe with a caller-supplied deadline.
    async fn ping(&self, deadline: Duration) -> Result<()>;
}
