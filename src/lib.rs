//! Adaptive authentication and abuse-mitigation gatekeeper.

pub mod admin;
pub mod clock;
pub mod config;
pub mod health;
pub mod http;
pub mod items;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use clock::{Clock, SystemClock};
pub use config::schema::GatekeeperConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{AbuseTracker, Gatekeeper, Rejection, SignatureVerifier};
