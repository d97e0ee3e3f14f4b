//! The request pipeline.
//!
//! # Data Flow
//! ```text
//! Every request traverses, outermost first:
//!     panic recovery (tower-http CatchPanicLayer → 500)
//!     → request_id.rs (assign X-Request-Id)
//!     → access_log.rs (log + hand outcome to the sink)
//!     → CORS (tower-http CorsLayer)
//!     → api_key.rs (resolve credential; absent = anonymous)
//!     → rate_limit.rs (tier quota; 429 with Retry-After)
//!     → route handler (dispatch / admin / health)
//! ```
//!
//! # Design Decisions
//! - A total order per request: auth → rate check → dispatch → logging
//! - The access log sits outside auth so 401s and 429s are logged too
//! - Credential identity crosses middleware boundaries via extensions

pub mod access_log;
pub mod api_key;
pub mod rate_limit;
pub mod request_id;

pub use access_log::access_log;
pub use api_key::{resolve_api_key, AuthedKey};
pub use rate_limit::enforce_rate_limit;
pub use request_id::{assign_request_id, RequestId, X_REQUEST_ID};
