use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::handlers::{series, statistics};
use crate::middleware::timing;
use crate::AppState;

/// Builds the read-only API router, with `static/` served as a fallback
/// for an external dashboard bundle.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── History ─────────────────────────────────────────────
        .route("/api/targets", get(series::list_targets))
        .route("/api/latency/:target", get(series::get_latency))
        .route("/api/throughput", get(series::get_throughput))
        // ── Statistics ──────────────────────────────────────────
        .route("/api/statistics", get(statistics::get_statistics))
        .route(
            "/api/statistics/stream",
            get(statistics::statistics_stream),
        )
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Serve static/ directory for the dashboard ───────────
        .fallback_service(ServeDir::new("static"))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
