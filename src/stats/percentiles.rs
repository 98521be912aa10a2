use hdrhistogram::Histogram;
use serde::Serialize;

/// Recording range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Percentile breakdown of smoothed latency, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileSet {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: u64,
}

impl PercentileSet {
    /// Summarize latencies given in milliseconds. Zero (failed) and
    /// non-finite values are skipped; values above 60 s are clamped.
    pub fn from_millis(values: &[f64]) -> Self {
        let Ok(mut hist) = Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        else {
            return Self::empty();
        };

        for &ms in values {
            if !(ms.is_finite() && ms > 0.0) {
                continue;
            }
            let us = ((ms * 1000.0).round() as u64).clamp(HIST_LOW, HIST_HIGH);
            let _ = hist.record(us);
        }

        Self::from_histogram(&hist)
    }

    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        let ms = |us: u64| us as f64 / 1000.0;
        Self {
            min: ms(hist.min()),
            max: ms(hist.max()),
            mean: hist.mean() / 1000.0,
            p50: ms(hist.value_at_quantile(0.50)),
            p95: ms(hist.value_at_quantile(0.95)),
            p99: ms(hist.value_at_quantile(0.99)),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
            count: 0,
        }
    }

    #[cfg(test)]
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
