//! Asynchronous request-outcome sink.
//!
//! Every request produces one `RequestLog`; the sink buffers them on a
//! bounded channel and a background worker batch-inserts into Postgres.
//! `record` never blocks the request path: when the buffer is full the
//! entry is dropped and counted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

const BATCH_SIZE: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// One logged request outcome.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub timestamp: DateTime<Utc>,
    pub api_key_id: Option<Uuid>,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub response_time_ms: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub backend_server: String,
}

/// Handle used by the pipeline to hand off outcomes.
#[derive(Clone)]
pub struct RequestLogSink {
    tx: mpsc::Sender<RequestLog>,
}

impl RequestLogSink {
    /// Sink that batches into the `request_logs` table.
    pub fn postgres(pool: PgPool, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(run_postgres_worker(pool, rx));
        Self { tx }
    }

    /// Sink that emits outcomes as tracing events only. Used in tests and in
    /// deployments without a log database.
    pub fn tracing_only(buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<RequestLog>(buffer);
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                tracing::debug!(
                    method = %entry.method,
                    path = %entry.path,
                    status = entry.status_code,
                    latency_ms = entry.response_time_ms,
                    backend = %entry.backend_server,
                    "request outcome"
                );
            }
        });
        Self { tx }
    }

    /// Queue an outcome. Drops the entry rather than blocking when full.
    pub fn record(&self, entry: RequestLog) {
        if self.tx.try_send(entry).is_err() {
            tracing::warn!("Request log buffer full, dropping entry");
        }
    }
}

/// Create the request_logs table if this is a fresh database.
pub async fn migrate_request_logs(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS request_logs (
            id BIGSERIAL PRIMARY KEY,
            timestamp TIMESTAMPTZ NOT NULL,
            api_key_id UUID,
            method TEXT NOT NULL,
            path TEXT NOT NULL,
            status_code INT NOT NULL,
            response_time_ms BIGINT NOT NULL,
            ip_address TEXT NOT NULL,
            user_agent TEXT NOT NULL,
            backend_server TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn run_postgres_worker(pool: PgPool, mut rx: mpsc::Receiver<RequestLog>) {
    let mut batch: Vec<RequestLog> = Vec::with_capacity(BATCH_SIZE);
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            entry = rx.recv() => {
                match entry {
                    Some(entry) => {
                        batch.push(entry);
                        if batch.len() >= BATCH_SIZE {
                            insert_batch(&pool, &mut batch).await;
                        }
                    }
                    // Channel closed: flush what is left and exit.
                    None => {
                        insert_batch(&pool, &mut batch).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                insert_batch(&pool, &mut batch).await;
            }
        }
    }
}

async fn insert_batch(pool: &PgPool, batch: &mut Vec<RequestLog>) {
    if batch.is_empty() {
        return;
    }

    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        "INSERT INTO request_logs \
         (timestamp, api_key_id, method, path, status_code, response_time_ms, \
          ip_address, user_agent, backend_server) ",
    );
    builder.push_values(batch.drain(..), |mut row, entry| {
        row.push_bind(entry.timestamp)
            .push_bind(entry.api_key_id)
            .push_bind(entry.method)
            .push_bind(entry.path)
            .push_bind(entry.status_code as i32)
            .push_bind(entry.response_time_ms)
            .push_bind(entry.ip_address)
            .push_bind(entry.user_agent)
            .push_bind(entry.backend_server);
    });

    if let Err(e) = builder.build().execute(pool).await {
        tracing::error!(error = %e, "Failed to insert request logs");
    }
}
