//! Operator endpoints.
//!
//! ```text
//! GET /admin/status    → version and state
//! GET /admin/security  → abuse tracker snapshot
//! ```
//!
//! Guarded by `Authorization: Bearer <admin.api_key>`, independent of the
//! gatekeeper.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::security::AbuseTracker;

use self::auth::admin_auth_middleware;
use self::handlers::{get_security, get_status};

/// State shared by the admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub tracker: Arc<AbuseTracker>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/security", get(get_security))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
