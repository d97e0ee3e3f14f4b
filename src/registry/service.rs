//! Credential resolution with read-through caching.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{GatewayError, Result};
use crate::registry::{ApiKey, CredentialStore, CredentialUpdate};
use crate::store::StateStore;

/// How long a resolved credential may be served from the cache. Bounds the
/// staleness window after an admin mutation that missed invalidation.
pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolves presented API keys against the durable registry, caching results
/// in the shared state store.
pub struct CredentialRegistry {
    cache: Arc<dyn StateStore>,
    durable: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialRegistry {
    pub fn new(
        cache: Arc<dyn StateStore>,
        durable: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            durable,
            clock,
        }
    }

    /// Hex-encoded SHA-256 of a presented key.
    pub fn hash_key(presented: &str) -> String {
        hex::encode(Sha256::digest(presented.as_bytes()))
    }

    fn cache_key(hash: &str) -> String {
        format!("apikey:cache:{}", hash)
    }

    /// Resolve a presented key to its credential record.
    ///
    /// Returns `Ok(None)` for unknown or inactive keys. Cache errors fall
    /// back to the durable registry; a durable failure is surfaced as
    /// authentication-unavailable so the caller can answer 503, not 401.
    pub async fn validate(&self, presented: &str) -> Result<Option<ApiKey>> {
        let hash = Self::hash_key(presented.trim());
        let cache_key = Self::cache_key(&hash);

        match self.cache.get(&cache_key).await {
            Ok(Some(cached)) => {
                if let Ok(key) = serde_json::from_str::<ApiKey>(&cached) {
                    return Ok(if key.is_active { Some(key) } else { None });
                }
                // Unparseable entries are treated as misses
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Credential cache read failed, querying registry");
            }
        }

        let found = self.durable.find_by_hash(&hash).await.map_err(|e| {
            tracing::error!(error = %e, "Durable credential lookup failed");
            GatewayError::AuthUnavailable
        })?;

        if let Some(key) = &found {
            match serde_json::to_string(key) {
                Ok(json) => {
                    if let Err(e) = self.cache.set_with_ttl(&cache_key, &json, CACHE_TTL).await {
                        tracing::warn!(error = %e, "Credential cache write failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Credential serialization failed"),
            }
        }

        Ok(found.filter(|k| k.is_active))
    }

    /// Fire-and-forget last-used update. Never blocks the request path.
    pub fn touch_last_used(&self, id: Uuid) {
        let durable = self.durable.clone();
        let now = self.clock.now();
        tokio::spawn(async move {
            if let Err(e) = durable.touch_last_used(id, now).await {
                tracing::debug!(error = %e, key_id = %id, "Last-used update failed");
            }
        });
    }

    /// Create a credential and return the plaintext key. This is the only
    /// time the plaintext is visible.
    pub async fn create(&self, name: &str, created_by: &str, tier: &str) -> Result<(String, ApiKey)> {
        let mut key_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let plaintext = format!("gw_{}", URL_SAFE_NO_PAD.encode(key_bytes));

        let key = ApiKey {
            id: Uuid::new_v4(),
            key_hash: Self::hash_key(&plaintext),
            name: name.to_string(),
            created_by: created_by.to_string(),
            tier: tier.to_string(),
            is_active: true,
            created_at: self.clock.now(),
            last_used_at: None,
        };

        self.durable.create(&key).await?;
        Ok((plaintext, key))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ApiKey>> {
        self.durable.find_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        self.durable.list().await
    }

    /// Apply a partial update, invalidating the cache entry first so the
    /// change is visible within the staleness bound.
    pub async fn update(&self, id: Uuid, update: &CredentialUpdate) -> Result<bool> {
        self.invalidate(id).await;
        self.durable.update(id, update).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        self.invalidate(id).await;
        self.durable.delete(id).await
    }

    pub async fn ping(&self, deadline: Duration) -> Result<()> {
        self.durable.ping(deadline).await
    }

    /// Best-effort cache invalidation; the TTL bounds staleness regardless.
    async fn invalidate(&self, id: Uuid) {
        let hash = match self.durable.find_by_id(id).await {
            Ok(Some(key)) => key.key_hash,
            _ => return,
        };
        if let Err(e) = self.cache.delete(&Self::cache_key(&hash)).await {
            tracing::warn!(error = %e, key_id = %id, "Credential cache invalidation failed");
        }
    }
}
