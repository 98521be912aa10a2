use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::series::{LatencySeriesSnapshot, ThroughputSeriesSnapshot};
use crate::AppState;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct TargetList {
    pub targets: Vec<String>,
}

// ─── GET /api/targets ────────────────────────────────────────────

pub async fn list_targets(State(state): State<Arc<AppState>>) -> Json<TargetList> {
    Json(TargetList {
        targets: state.history.targets().to_vec(),
    })
}

// ─── GET /api/latency/:target ────────────────────────────────────

pub async fn get_latency(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
) -> Result<Json<LatencySeriesSnapshot>, AppError> {
    state
        .history
        .latency_series(&target)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("target '{target}' is not monitored")))
}

// ─── GET /api/throughput ─────────────────────────────────────────

pub async fn get_throughput(
    State(state): State<Arc<AppState>>,
) -> Json<ThroughputSeriesSnapshot> {
    Json(state.history.throughput_series())
}
