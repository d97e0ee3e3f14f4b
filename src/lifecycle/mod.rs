//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup: load config → validate → connect store + registry →
//!          migrations → start server and health loops
//!
//! Shutdown: SIGINT/SIGTERM → ShutdownController::drain → listener stops
//!           accepting, health loops exit, in-flight requests drain within
//!           the grace period → process exits
//! ```

pub mod shutdown;

pub use shutdown::ShutdownController;
