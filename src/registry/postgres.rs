//! Postgres-backed durable credential registry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::registry::{ApiKey, CredentialStore, CredentialUpdate};

const COLUMNS: &str = "id, key_hash, name, created_by, tier, is_active, created_at, last_used_at";

pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the api_keys table if this is a fresh database.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY,
                key_hash TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL DEFAULT '',
                tier TEXT NOT NULL DEFAULT 'basic',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_used_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn create(&self, key: &ApiKey) -> Result<()> {
        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, name, created_by, tier, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(key.id)
        .bind(&key.key_hash)
        .bind(&key.name)
        .bind(&key.created_by)
        .bind(&key.tier)
        .bind(key.is_active)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<ApiKey>> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE key_hash = $1 AND is_active = TRUE"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn list(&self) -> Result<Vec<ApiKey>> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {COLUMNS} FROM api_keys ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn update(&self, id: Uuid, update: &CredentialUpdate) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE api_keys SET tier = COALESCE($2, tier), is_active = COALESCE($3, is_active) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.tier)
        .bind(update.is_active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self, deadline: Duration) -> Result<()> {
        tokio::time::timeout(deadline, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| GatewayError::Internal("database ping timed out".to_string()))??;
        Ok(())
    }
}
