//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain)
//!     → /health | /admin/* | dispatcher fallback
//!     → response streamed to client
//! ```

pub mod server;

pub use server::{AppState, GatewayServer};
