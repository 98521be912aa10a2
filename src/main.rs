use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod handlers;
mod middleware;
mod probe;
mod recorder;
mod series;
mod server;
mod smoothing;
mod stats;

use config::{ProbeMode, RecorderConfig};
use probe::{
    CommandThroughput, LatencyProbe, SimulatedLatency, SimulatedThroughput, SystemPing,
    ThroughputProbe,
};
use recorder::{History, Recorder};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Read-only view of the recorder's series; the recorder task is the
    /// only writer.
    pub history: History,

    /// Push cadence for the statistics SSE stream.
    pub stream_interval: Duration,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── 1. Load configuration ────────────────────────────────────
    let cfg = match RecorderConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        targets = ?cfg.targets,
        mode = ?cfg.probe_mode,
        retention_hours = cfg.retention_hours,
        "configuration loaded"
    );

    // ── 2. Start the recorder ────────────────────────────────────
    let history = match cfg.probe_mode {
        ProbeMode::System => {
            let Some(throughput) = CommandThroughput::new(&cfg.throughput_command) else {
                error!("throughput_command is empty");
                std::process::exit(1);
            };
            spawn_recorder(cfg.clone(), SystemPing::default(), throughput)
        }
        ProbeMode::Simulated => spawn_recorder(
            cfg.clone(),
            SimulatedLatency::new(1000),
            SimulatedThroughput::new(2000),
        ),
    };

    // ── 3. Build shared state & router ───────────────────────────
    let state = Arc::new(AppState {
        history,
        stream_interval: Duration::from_millis(cfg.stream_interval_ms.max(1)),
    });
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = match tokio::net::TcpListener::bind(&cfg.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %cfg.bind_addr, error = %e, "cannot bind");
            std::process::exit(1);
        }
    };

    info!(addr = %cfg.bind_addr, "serving /api/targets, /api/latency/:target, /api/throughput, /api/statistics[/stream]");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
    info!("shutting down");
}

fn spawn_recorder<L, T>(cfg: RecorderConfig, latency: L, throughput: T) -> History
where
    L: LatencyProbe,
    T: ThroughputProbe,
{
    let recorder = Recorder::new(cfg, latency, throughput);
    let history = recorder.history();
    tokio::spawn(recorder.run());
    history
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
    }
}
