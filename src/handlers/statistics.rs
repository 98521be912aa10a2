use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::stats::StatisticsReport;
use crate::AppState;

// ─── GET /api/statistics ─────────────────────────────────────────
/// Recomputes every histogram and returns a single JSON report.

pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
) -> Json<StatisticsReport> {
    Json(state.history.compute_statistics())
}

// ─── GET /api/statistics/stream ──────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a fresh `StatisticsReport` every `stream_interval_ms`.

pub async fn statistics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.stream_interval);

    let stream = IntervalStream::new(interval).map(move |_| {
        let report = state.history.compute_statistics();
        let json = serde_json::to_string(&report).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
