//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (one loop per route)
//!     → probe each target concurrently (GET <target><path>, bounded timeout)
//!     → record success/failure per target
//!     → recompute healthy subset atomically
//!     → dispatcher reads the subset at dispatch time
//! ```
//!
//! # Design Decisions
//! - Consecutive-failure threshold prevents flapping on transient errors
//! - Targets start healthy to avoid cold-start traffic loss (configurable)
//! - Readers get copied snapshots; no caller observes a mid-update state

pub mod checker;
pub mod status;

pub use checker::HealthChecker;
pub use status::{ServiceHealth, TargetStatus};
