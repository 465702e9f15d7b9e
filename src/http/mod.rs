//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (layers: sensitive headers, request id, trace, CORS,
//!       timeout, body limit)
//!     → /healthz, /livez          (no credentials)
//!     → /admin/*                  (admin key)
//!     → everything else           (gatekeeper, then items or 404)
//!     → response.rs (JSON error bodies)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{json_error, ErrorBody};
pub use server::HttpServer;
