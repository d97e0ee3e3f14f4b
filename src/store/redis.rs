//! Redis-backed state store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{GatewayError, Result};
use crate::store::StateStore;

/// State store backed by Redis with automatic reconnection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to a Redis server. Supports redis:// and rediss:// URLs.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(GatewayError::Store)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(GatewayError::Store)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let n: i64 = conn.incr(key, 1).await?;
        Ok(n)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.zrembyscore(key, lo, hi).await?;
        Ok(removed)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.zcard(key).await?;
        Ok(count)
    }

    async fn zcount(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.zcount(key, lo, hi).await?;
        Ok(count)
    }

    async fn zrange_oldest(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrange(key, 0, 0).await?;
        Ok(members.into_iter().next())
    }

    async fn purge_and_count(&self, key: &str, cutoff: f64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let (_removed, count): (u64, u64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(cutoff)
            .cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn ping(&self, deadline: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong = tokio::time::timeout(deadline, async {
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(pong)
        })
        .await
        .map_err(|_| GatewayError::Internal("redis ping timed out".to_string()))??;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(GatewayError::Internal(format!(
                "unexpected ping reply: {}",
                pong
            )))
        }
    }
}
