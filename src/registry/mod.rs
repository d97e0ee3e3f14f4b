//! Credential registry subsystem.
//!
//! # Data Flow
//! ```text
//! X-API-Key header
//!     → service.rs (SHA-256 hash)
//!     → cache in the shared state store (apikey:cache:<hash>, 5 min TTL)
//!     → on miss: CredentialStore (durable registry)
//!     → write-back to cache
//! Admin mutation → durable write + best-effort cache invalidation
//! ```
//!
//! # Design Decisions
//! - The plaintext key is never stored; only its SHA-256 hex digest
//! - Cache failures fall back to the durable registry (fail-open);
//!   durable failures surface as "authentication unavailable"
//! - Staleness after a mutation is bounded by the cache TTL

pub mod memory;
pub mod postgres;
pub mod service;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub use memory::MemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub use service::CredentialRegistry;

/// A stored API key credential.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub name: String,
    pub created_by: String,
    pub tier: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Partial update applied by the admin surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialUpdate {
    pub tier: Option<String>,
    pub is_active: Option<bool>,
}

/// The durable registry the gateway consults on cache misses. Owned by admin
/// writes; shared-read from the request path.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, key: &ApiKey) -> Result<()>;

    /// Look up an *active* credential by key hash.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<ApiKey>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKey>>;

    async fn list(&self) -> Result<Vec<ApiKey>>;

    /// Returns false when no credential has that id.
    async fn update(&self, id: Uuid, update: &CredentialUpdate) -> Result<bool>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn ping(&self, deadline: Duration) -> Result<()>;
}
