//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (X-Forwarded-For or peer address, port stripped)
//!     → gate.rs (block check, slowdown, bearer token)
//!     → signature.rs (HMAC over token|timestamp|method|path)
//!     → abuse.rs (record failure or reset on success)
//!     → Pass to inner handler
//!
//! Background:
//!     abuse.rs CleanupTask → evict stale addresses and expired subnet blocks
//! ```
//!
//! # Design Decisions
//! - Fail closed: any check failure rejects the request
//! - Failure state is in-memory and per process
//! - Rejection bodies are generic; the reason goes to the log

pub mod abuse;
pub mod client_ip;
pub mod gate;
pub mod signature;

pub use abuse::{AbuseTracker, CleanupReport, CleanupTask, FailureOutcome, TrackerStats};
pub use gate::{gatekeeper_middleware, Gatekeeper, Rejection};
pub use signature::{SignatureError, SignatureVerifier};
