//! In-process state store.
//!
//! Implements the full `StateStore` contract against mutex-guarded maps,
//! honoring TTLs against an injected clock. Used by the test suite and by
//! single-instance deployments that run without a shared store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{GatewayError, Result};
use crate::store::StateStore;

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone)]
struct ZSetEntry {
    // (score, member), kept sorted by score
    members: Vec<(f64, String)>,
    expires_at: Option<DateTime<Utc>>,
}

/// Mutex-guarded in-memory store.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    kv: Mutex<HashMap<String, KvEntry>>,
    zsets: Mutex<HashMap<String, ZSetEntry>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            kv: Mutex::new(HashMap::new()),
            zsets: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail, to exercise outage handling.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GatewayError::Store(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "simulated store outage",
            ))))
        } else {
            Ok(())
        }
    }

    fn expired(&self, expires_at: Option<DateTime<Utc>>) -> bool {
        matches!(expires_at, Some(at) if self.clock.now() >= at)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        self.check_available()?;
        let mut kv = self.kv.lock().expect("store mutex poisoned");
        match kv.get_mut(key) {
            Some(entry) if !self.expired(entry.expires_at) => {
                let n: i64 = entry.value.parse().unwrap_or(0) + 1;
                entry.value = n.to_string();
                Ok(n)
            }
            _ => {
                kv.insert(
                    key.to_string(),
                    KvEntry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let deadline = self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        if let Some(entry) = self.kv.lock().expect("store mutex poisoned").get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        if let Some(entry) = self.zsets.lock().expect("store mutex poisoned").get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut kv = self.kv.lock().expect("store mutex poisoned");
        match kv.get(key) {
            Some(entry) if !self.expired(entry.expires_at) => Ok(Some(entry.value.clone())),
            Some(_) => {
                kv.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let expires_at =
            Some(self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or_default());
        self.kv.lock().expect("store mutex poisoned").insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.kv.lock().expect("store mutex poisoned").remove(key);
        self.zsets.lock().expect("store mutex poisoned").remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.check_available()?;
        let mut zsets = self.zsets.lock().expect("store mutex poisoned");
        let entry = zsets.entry(key.to_string()).or_default();
        if self.expired(entry.expires_at) {
            entry.members.clear();
            entry.expires_at = None;
        }
        entry.members.retain(|(_, m)| m != member);
        entry.members.push((score, member.to_string()));
        entry
            .members
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zrem_range_by_score(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        self.check_available()?;
        let mut zsets = self.zsets.lock().expect("store mutex poisoned");
        let Some(entry) = zsets.get_mut(key) else {
            return Ok(0);
        };
        if self.expired(entry.expires_at) {
            zsets.remove(key);
            return Ok(0);
        }
        let before = entry.members.len();
        entry.members.retain(|(s, _)| *s < lo || *s > hi);
        Ok((before - entry.members.len()) as u64)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.check_available()?;
        let mut zsets = self.zsets.lock().expect("store mutex poisoned");
        match zsets.get(key) {
            Some(entry) if !self.expired(entry.expires_at) => Ok(entry.members.len() as u64),
            Some(_) => {
                zsets.remove(key);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn zcount(&self, key: &str, lo: f64, hi: f64) -> Result<u64> {
        self.check_available()?;
        let zsets = self.zsets.lock().expect("store mutex poisoned");
        match zsets.get(key) {
            Some(entry) if !self.expired(entry.expires_at) => Ok(entry
                .members
                .iter()
                .filter(|(s, _)| *s >= lo && *s <= hi)
                .count() as u64),
            _ => Ok(0),
        }
    }

    async fn zrange_oldest(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let zsets = self.zsets.lock().expect("store mutex poisoned");
        match zsets.get(key) {
            Some(entry) if !self.expired(entry.expires_at) => {
                Ok(entry.members.first().map(|(_, m)| m.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn purge_and_count(&self, key: &str, cutoff: f64) -> Result<u64> {
        self.zrem_range_by_score(key, 0.0, cutoff).await?;
        self.zcard(key).await
    }

    async fn ping(&self, _deadline: Duration) -> Result<()> {
        self.check_available()
    }
}
