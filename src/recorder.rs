use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::error::ProbeError;
use crate::probe::{LatencyProbe, Throughput, ThroughputProbe};
use crate::series::{LatencySeriesSnapshot, SeriesStore, ThroughputSeriesSnapshot, Timestamp};
use crate::stats::{self, StatisticsParams, StatisticsReport};

// ─── Read side ───────────────────────────────────────────────────

/// Cloneable read-only view of everything the recorder has written.
/// Each call takes the store lock once, so callers always see
/// fully-appended ticks.
#[derive(Clone)]
pub struct History {
    store: Arc<Mutex<SeriesStore>>,
    targets: Arc<[String]>,
    params: StatisticsParams,
}

impl History {
    fn new(config: &RecorderConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(SeriesStore::new(&config.targets))),
            targets: config.targets.clone().into(),
            params: StatisticsParams {
                latency_window: config.statistics_window(),
                throughput_window: config.throughput_statistics_window(),
                bins: config.histogram_bins,
            },
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// `None` for a host that isn't being monitored.
    pub fn latency_series(&self, target: &str) -> Option<LatencySeriesSnapshot> {
        self.store.lock().latency(target).map(|s| s.snapshot(target))
    }

    pub fn throughput_series(&self) -> ThroughputSeriesSnapshot {
        self.store.lock().throughput().snapshot()
    }

    /// Recompute every histogram from the current history.
    pub fn compute_statistics(&self) -> StatisticsReport {
        stats::compute(&self.store.lock(), self.params)
    }
}

// ─── Write side ──────────────────────────────────────────────────

/// What happened during one tick. Mostly for logs and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub latency_failures: usize,
    pub evicted: usize,
    /// A throughput measurement was launched this tick
    pub throughput_started: bool,
    /// A finished throughput measurement was appended this tick
    pub throughput: Option<Throughput>,
}

/// A throughput measurement tagged with the tick that launched it.
type ThroughputOutcome = (Timestamp, Result<Throughput, ProbeError>);

/// The single writer. Owns the probes and drives the sampling loop.
///
/// A freshly built recorder is idle; `run` moves it into the running
/// state, where it stays until the process exits.
pub struct Recorder<L, T> {
    config: RecorderConfig,
    latency: Arc<L>,
    throughput: Arc<T>,
    history: History,
    /// Ticks since the last throughput launch
    ticks: u64,
    /// At most one throughput measurement in flight
    pending: JoinSet<ThroughputOutcome>,
}

impl<L: LatencyProbe, T: ThroughputProbe> Recorder<L, T> {
    pub fn new(config: RecorderConfig, latency: L, throughput: T) -> Self {
        let history = History::new(&config);
        Self {
            config,
            latency: Arc::new(latency),
            throughput: Arc::new(throughput),
            history,
            ticks: 0,
            pending: JoinSet::new(),
        }
    }

    pub fn history(&self) -> History {
        self.history.clone()
    }

    /// Sample forever at `ping_interval_seconds`.
    pub async fn run(mut self) {
        info!(
            targets = ?self.config.targets,
            interval = ?self.config.ping_interval(),
            speed_every_ticks = self.config.speed_interval_ticks(),
            "recorder running"
        );

        let mut interval = tokio::time::interval(self.config.ping_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let summary = self.tick(Timestamp::now()).await;
            debug!(
                failures = summary.latency_failures,
                evicted = summary.evicted,
                throughput_started = summary.throughput_started,
                throughput = summary.throughput.is_some(),
                "tick"
            );
        }
    }

    /// One iteration of the loop, stamped with `now`.
    ///
    /// Throughput runs in the background: a tick only launches it, and a
    /// later tick appends the result under the launch timestamp.
    pub async fn tick(&mut self, now: Timestamp) -> TickSummary {
        let results = self.measure_latency().await;
        let retention = self.config.retention();
        let kernel = self.config.kernel_ticks();

        let mut summary = TickSummary::default();
        {
            // Append + evict is one critical section
            let mut store = self.history.store.lock();
            while let Some(joined) = self.pending.try_join_next() {
                if let Some(t) = append_throughput(&mut store, joined) {
                    summary.throughput = Some(t);
                }
            }
            summary.evicted = store.evict_all(now, retention);

            for ((target, series), result) in store.iter_latency_mut().zip(&results) {
                if let Err(e) = result {
                    debug!(host = target, error = %e, "latency probe failed");
                    summary.latency_failures += 1;
                }
                series.push(now, result, kernel);
            }
        }

        self.ticks += 1;
        if self.ticks >= self.config.speed_interval_ticks() {
            self.ticks = 0;
            summary.throughput_started = self.start_throughput(now);
        }

        summary
    }

    /// Probe every target concurrently. Results come back in target order.
    async fn measure_latency(&self) -> Vec<Result<f64, ProbeError>> {
        let limit = self.config.latency_timeout();
        let mut set = JoinSet::new();

        for (idx, target) in self.history.targets.iter().enumerate() {
            let probe = Arc::clone(&self.latency);
            let target = target.clone();
            set.spawn(async move {
                let result = match timeout(limit, probe.measure(&target)).await {
                    Ok(r) => r,
                    Err(_) => Err(ProbeError::Timeout(limit)),
                };
                (idx, result)
            });
        }

        let mut results: Vec<Result<f64, ProbeError>> = self
            .history
            .targets
            .iter()
            .map(|_| Err(ProbeError::Join("no result".into())))
            .collect();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = result,
                Err(e) => warn!(error = %e, "latency probe task failed"),
            }
        }
        results
    }

    /// Launch a throughput measurement unless one is still running.
    fn start_throughput(&mut self, now: Timestamp) -> bool {
        if !self.pending.is_empty() {
            warn!(launched_at = %now, "previous throughput probe still running, skipping this one");
            return false;
        }

        let probe = Arc::clone(&self.throughput);
        let limit = self.config.throughput_timeout();
        self.pending.spawn(async move {
            let result = match timeout(limit, probe.measure()).await {
                Ok(r) => r,
                Err(_) => Err(ProbeError::Timeout(limit)),
            };
            (now, result)
        });
        true
    }

    /// Wait for the in-flight throughput measurement and append it.
    #[cfg(test)]
    async fn settle_throughput(&mut self) {
        while let Some(joined) = self.pending.join_next().await {
            append_throughput(&mut self.history.store.lock(), joined);
        }
    }
}

/// A failed or timed-out probe skips the append.
fn append_throughput(
    store: &mut SeriesStore,
    joined: Result<ThroughputOutcome, JoinError>,
) -> Option<Throughput> {
    match joined {
        Ok((launched, Ok(t))) => {
            store.throughput_mut().push(launched, t.download_mbps, t.upload_mbps);
            info!(
                download_mbps = t.download_mbps,
                upload_mbps = t.upload_mbps,
                launched_at = %launched,
                "throughput sampled"
            );
            Some(t)
        }
        Ok((_, Err(e))) => {
            warn!(error = %e, "throughput probe failed, skipping sample");
            None
        }
        Err(e) => {
            warn!(error = %e, "throughput probe task failed");
            None
        }
    }
}
