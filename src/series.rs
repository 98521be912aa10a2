use std::collections::VecDeque;
use std::fmt;

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use serde::{Serialize, Serializer};

use crate::error::ProbeError;
use crate::smoothing::{self, Smoothed};

// ─── Timestamp ───────────────────────────────────────────────────

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Second-precision UTC wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_naive(Utc::now().naive_utc())
    }

    /// Drops sub-second precision.
    pub fn from_naive(t: NaiveDateTime) -> Self {
        Self(t.with_nanosecond(0).unwrap_or(t))
    }

    #[cfg(test)]
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .ok()
            .map(Self)
    }

    pub fn checked_sub(self, d: Duration) -> Option<Self> {
        self.0.checked_sub_signed(d).map(Self)
    }

    #[cfg(test)]
    pub fn checked_add(self, d: Duration) -> Option<Self> {
        self.0.checked_add_signed(d).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

// ─── Retention ───────────────────────────────────────────────────

/// Anything made of parallel per-tick columns keyed by a timestamp column.
pub trait Retained {
    fn timestamps(&self) -> &VecDeque<Timestamp>;

    /// Drop the oldest entry from every column.
    fn pop_oldest(&mut self);

    /// Panics if the columns disagree in length.
    fn check_invariants(&self);
}

/// Evict every entry older than `now - window`. Returns how many were removed.
/// An empty series is a no-op.
pub fn evict_older_than<S: Retained>(series: &mut S, now: Timestamp, window: Duration) -> usize {
    let Some(cutoff) = now.checked_sub(window) else {
        return 0;
    };

    let mut evicted = 0;
    while series.timestamps().front().is_some_and(|oldest| *oldest < cutoff) {
        series.pop_oldest();
        evicted += 1;
    }
    series.check_invariants();
    evicted
}

/// Keeps appends non-decreasing when the wall clock steps backwards.
fn monotonic(last: Option<&Timestamp>, now: Timestamp) -> Timestamp {
    match last {
        Some(prev) if *prev > now => *prev,
        _ => now,
    }
}

// ─── Latency series ──────────────────────────────────────────────

/// Per-target latency history. Columns are always the same length.
#[derive(Debug, Clone, Default)]
pub struct LatencySeries {
    timestamp: VecDeque<Timestamp>,
    raw: VecDeque<f64>,
    avg: VecDeque<f64>,
    max: VecDeque<f64>,
    jitter: VecDeque<f64>,
    errors: VecDeque<u32>,
}

/// Read-only copy handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySeriesSnapshot {
    pub target: String,
    pub timestamp: Vec<Timestamp>,
    pub value: Vec<f64>,
    pub avg: Vec<f64>,
    pub max: Vec<f64>,
    pub jitter: Vec<f64>,
    pub errors: Vec<u32>,
}

impl LatencySeries {
    fn len(&self) -> usize {
        self.timestamp.len()
    }

    /// Append one tick. A failed measurement (or a value that cannot be a
    /// latency) enters the series as the `0.0` sentinel.
    pub fn push(
        &mut self,
        now: Timestamp,
        measurement: &Result<f64, ProbeError>,
        kernel: usize,
    ) -> Smoothed {
        let raw = match measurement {
            Ok(ms) if ms.is_finite() && *ms > 0.0 => *ms,
            _ => 0.0,
        };

        let ts = monotonic(self.timestamp.back(), now);
        self.timestamp.push_back(ts);
        self.raw.push_back(raw);

        let s = smoothing::smooth(self.raw.iter().copied(), kernel);
        self.avg.push_back(s.avg);
        self.max.push_back(s.max);
        self.jitter.push_back(s.jitter);
        self.errors.push_back(s.error_count);

        self.check_invariants();
        s
    }

    /// Trailing `n` entries of the smoothed columns (avg, max, jitter, errors).
    pub fn trailing(&self, n: usize) -> TrailingWindow {
        let start = self.len() - n.min(self.len());
        TrailingWindow {
            avg: self.avg.range(start..).copied().collect(),
            max: self.max.range(start..).copied().collect(),
            jitter: self.jitter.range(start..).copied().collect(),
            errors: self.errors.range(start..).copied().collect(),
        }
    }

    pub fn snapshot(&self, target: &str) -> LatencySeriesSnapshot {
        LatencySeriesSnapshot {
            target: target.to_string(),
            timestamp: self.timestamp.iter().copied().collect(),
            value: self.raw.iter().copied().collect(),
            avg: self.avg.iter().copied().collect(),
            max: self.max.iter().copied().collect(),
            jitter: self.jitter.iter().copied().collect(),
            errors: self.errors.iter().copied().collect(),
        }
    }
}

impl Retained for LatencySeries {
    fn timestamps(&self) -> &VecDeque<Timestamp> {
        &self.timestamp
    }

    fn pop_oldest(&mut self) {
        self.timestamp.pop_front();
        self.raw.pop_front();
        self.avg.pop_front();
        self.max.pop_front();
        self.jitter.pop_front();
        self.errors.pop_front();
    }

    fn check_invariants(&self) {
        let n = self.timestamp.len();
        for (name, len) in [
            ("value", self.raw.len()),
            ("avg", self.avg.len()),
            ("max", self.max.len()),
            ("jitter", self.jitter.len()),
            ("errors", self.errors.len()),
        ] {
            assert_eq!(len, n, "latency series column `{name}` out of step");
        }
    }
}

/// Copied trailing slice of a latency series' smoothed columns.
#[derive(Debug, Clone, Default)]
pub struct TrailingWindow {
    pub avg: Vec<f64>,
    pub max: Vec<f64>,
    pub jitter: Vec<f64>,
    pub errors: Vec<u32>,
}

// ─── Throughput series ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ThroughputSeries {
    timestamp: VecDeque<Timestamp>,
    download: VecDeque<f64>,
    upload: VecDeque<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSeriesSnapshot {
    pub timestamp: Vec<Timestamp>,
    pub download: Vec<f64>,
    pub upload: Vec<f64>,
}

impl ThroughputSeries {
    fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn push(&mut self, now: Timestamp, download_mbps: f64, upload_mbps: f64) {
        let ts = monotonic(self.timestamp.back(), now);
        self.timestamp.push_back(ts);
        self.download.push_back(download_mbps);
        self.upload.push_back(upload_mbps);
        self.check_invariants();
    }

    /// Trailing `n` (download, upload) values.
    pub fn trailing(&self, n: usize) -> (Vec<f64>, Vec<f64>) {
        let start = self.len() - n.min(self.len());
        (
            self.download.range(start..).copied().collect(),
            self.upload.range(start..).copied().collect(),
        )
    }

    pub fn snapshot(&self) -> ThroughputSeriesSnapshot {
        ThroughputSeriesSnapshot {
            timestamp: self.timestamp.iter().copied().collect(),
            download: self.download.iter().copied().collect(),
            upload: self.upload.iter().copied().collect(),
        }
    }
}

impl Retained for ThroughputSeries {
    fn timestamps(&self) -> &VecDeque<Timestamp> {
        &self.timestamp
    }

    fn pop_oldest(&mut self) {
        self.timestamp.pop_front();
        self.download.pop_front();
        self.upload.pop_front();
    }

    fn check_invariants(&self) {
        let n = self.timestamp.len();
        assert_eq!(self.download.len(), n, "throughput column `download` out of step");
        assert_eq!(self.upload.len(), n, "throughput column `upload` out of step");
    }
}

// ─── Store ───────────────────────────────────────────────────────

/// All recorded history. Targets keep their configuration order.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    latency: Vec<(String, LatencySeries)>,
    throughput: ThroughputSeries,
}

impl SeriesStore {
    pub fn new(targets: &[String]) -> Self {
        Self {
            latency: targets
                .iter()
                .map(|t| (t.clone(), LatencySeries::default()))
                .collect(),
            throughput: ThroughputSeries::default(),
        }
    }

    pub fn latency(&self, target: &str) -> Option<&LatencySeries> {
        self.latency
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, s)| s)
    }

    #[cfg(test)]
    pub fn latency_mut(&mut self, target: &str) -> Option<&mut LatencySeries> {
        self.latency
            .iter_mut()
            .find(|(name, _)| name == target)
            .map(|(_, s)| s)
    }

    pub fn iter_latency(&self) -> impl Iterator<Item = (&str, &LatencySeries)> {
        self.latency.iter().map(|(name, s)| (name.as_str(), s))
    }

    pub fn iter_latency_mut(&mut self) -> impl Iterator<Item = (&str, &mut LatencySeries)> {
        self.latency.iter_mut().map(|(name, s)| (name.as_str(), s))
    }

    pub fn throughput(&self) -> &ThroughputSeries {
        &self.throughput
    }

    pub fn throughput_mut(&mut self) -> &mut ThroughputSeries {
        &mut self.throughput
    }

    /// Run retention over every series. Returns the total evicted.
    pub fn evict_all(&mut self, now: Timestamp, window: Duration) -> usize {
        let mut evicted = 0;
        for (_, series) in &mut self.latency {
            evicted += evict_older_than(series, now, window);
        }
        evicted + evict_older_than(&mut self.throughput, now, window)
    }
}
