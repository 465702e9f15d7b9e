//! Health and liveness endpoints.
//!
//! # Data Flow
//! ```text
//! GET /healthz → {"status":"ok"}
//! GET /livez   → {"status":"healthy","timestamp":...,"uptime_secs":...}
//! ```
//!
//! Both routes are mounted outside the gatekeeper so orchestrators can poll them
//! without credentials.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Body of `GET /livez`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Clone)]
struct HealthState {
    started: Instant,
    clock: Arc<dyn Clock>,
}

/// Router serving the health endpoints.
pub fn health_router(clock: Arc<dyn Clock>) -> Router {
    let state = HealthState {
        started: Instant::now(),
        clock,
    };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn livez(State(state): State<HealthState>) -> Json<LivenessReport> {
    Json(LivenessReport {
        status: "healthy".to_owned(),
        timestamp: state.clock.now_utc(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
