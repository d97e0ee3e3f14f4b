//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured tracing events (request id attached by the pipeline)
//!     → metrics (counters, gauges, histograms → Prometheus scrape endpoint)
//!     → per-request outcomes (request_log.rs → batched into Postgres)
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap atomic updates; the exporter runs its own listener
//! - Outcome logging is asynchronous and lossy under pressure, never a
//!   bottleneck on the request path

pub mod metrics;
pub mod request_log;

pub use request_log::{migrate_request_logs, RequestLog, RequestLogSink};
