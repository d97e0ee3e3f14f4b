//! In-process credential store for tests and store-less deployments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::registry::{ApiKey, CredentialStore, CredentialUpdate};

#[derive(Default)]
pub struct MemoryCredentialStore {
    keys: Mutex<HashMap<Uuid, ApiKey>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a credential directly, bypassing cache invalidation. Lets the
    /// test suite exercise the bounded-staleness window.
    pub fn remove_raw(&self, id: Uuid) {
        self.keys.lock().expect("registry mutex poisoned").remove(&id);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, key: &ApiKey) -> Result<()> {
        self.keys
            .lock()
            .expect("registry mutex poisoned")
            .insert(key.id, key.clone());
        Ok(())
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<ApiKey>> {
        Ok(self
            .keys
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .find(|k| k.key_hash == hash && k.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
        Ok(self
            .keys
            .lock()
            .expect("registry mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .lock()
            .expect("registry mutex poisoned")
            .values()
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn update(&self, id: Uuid, update: &CredentialUpdate) -> Result<bool> {
        let mut keys = self.keys.lock().expect("registry mutex poisoned");
        match keys.get_mut(&id) {
            Some(key) => {
                if let Some(tier) = &update.tier {
                    key.tier = tier.clone();
                }
                if let Some(active) = update.is_active {
                    key.is_active = active;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .keys
            .lock()
            .expect("registry mutex poisoned")
            .remove(&id)
            .is_some())
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(key) = self
            .keys
            .lock()
            .expect("registry mutex poisoned")
            .get_mut(&id)
        {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn ping(&self, _deadline: Duration) -> Result<()> {
        Ok(())
    }
}
