use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::security::TrackerStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_owned(),
        status: "operational".to_owned(),
    })
}

pub async fn get_security(State(state): State<AdminState>) -> Json<TrackerStats> {
    Json(state.tracker.stats())
}
