//! On-demand histograms over the trailing statistics window.
//!
//! Every target's avg/max/jitter histograms share one set of bin edges
//! spanning `[0, largest trailing max across all targets]`, so overlays line
//! up on a single axis. Throughput gets its own range, driven by download.

pub mod histogram;
pub mod percentiles;

use serde::Serialize;

use crate::series::SeriesStore;

pub use histogram::Histogram;
pub use percentiles::PercentileSet;

/// Window sizes and bin count used for one statistics pass.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsParams {
    /// Trailing latency samples per target
    pub latency_window: usize,
    /// Trailing throughput samples
    pub throughput_window: usize,
    pub bins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatistics {
    pub target: String,
    /// Number of trailing ticks summarized
    pub samples: usize,
    pub avg_histo: Vec<u64>,
    pub max_histo: Vec<u64>,
    pub jitter_histo: Vec<u64>,
    /// Summed error score over the window
    pub error_score: u64,
    pub percentiles: PercentileSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputStatistics {
    pub samples: usize,
    pub bin_edges: Vec<f64>,
    pub download_histo: Vec<u64>,
    pub upload_histo: Vec<u64>,
}

/// Everything the dashboard needs for its histogram panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    /// Canonical latency edges shared by every target
    pub ping_bin_edges: Vec<f64>,
    pub targets: Vec<TargetStatistics>,
    pub throughput: ThroughputStatistics,
}

/// Recompute all histograms from scratch. Reads only.
pub fn compute(store: &SeriesStore, params: StatisticsParams) -> StatisticsReport {
    let windows: Vec<_> = store
        .iter_latency()
        .map(|(name, series)| (name, series.trailing(params.latency_window)))
        .collect();

    // Empty windows contribute nothing to the shared range
    let range_max = windows
        .iter()
        .flat_map(|(_, w)| w.max.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);

    let canonical = Histogram::with_range(&[], params.bins, 0.0, range_max).bin_edges;

    let targets = windows
        .into_iter()
        .map(|(name, w)| TargetStatistics {
            target: name.to_string(),
            samples: w.max.len(),
            max_histo: Histogram::with_edges(&w.max, &canonical).counts,
            avg_histo: Histogram::with_edges(&w.avg, &canonical).counts,
            jitter_histo: Histogram::with_edges(&w.jitter, &canonical).counts,
            error_score: w.errors.iter().map(|e| u64::from(*e)).sum(),
            percentiles: PercentileSet::from_millis(&w.avg),
        })
        .collect();

    let (download, upload) = store.throughput().trailing(params.throughput_window);
    let download_histo = Histogram::auto(&download, params.bins);
    let upload_histo = Histogram::with_edges(&upload, &download_histo.bin_edges);

    StatisticsReport {
        ping_bin_edges: canonical,
        targets,
        throughput: ThroughputStatistics {
            samples: download.len(),
            bin_edges: download_histo.bin_edges,
            download_histo: download_histo.counts,
            upload_histo: upload_histo.counts,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::series::Timestamp;
    use chrono::Duration;

    const PARAMS: StatisticsParams = StatisticsParams {
        latency_window: 1800,
        throughput_window: 1,
        bins: 50,
    };

    fn start() -> Timestamp {
        Timestamp::parse("2024-05-01 08:00:00").unwrap()
    }

    fn store_with(samples: &[(&str, Vec<f64>)]) -> SeriesStore {
        let targets: Vec<String> = samples.iter().map(|(t, _)| t.to_string()).collect();
        let mut store = SeriesStore::new(&targets);
        for (target, values) in samples {
            let series = store.latency_mut(target).unwrap();
            for (i, v) in values.iter().enumerate() {
                let now = start().checked_add(Duration::seconds(i as i64)).unwrap();
                // kernel of 1 keeps max == raw so windows are easy to reason about
                series.push(now, &Ok::<f64, ProbeError>(*v), 1);
            }
        }
        store
    }

    #[test]
    fn range_is_shared_across_targets() {
        let store = store_with(&[("a", vec![5.0, 10.0]), ("b", vec![20.0, 30.0])]);
        let report = compute(&store, PARAMS);

        assert_eq!(report.ping_bin_edges.len(), 51);
        assert_eq!(report.ping_bin_edges[0], 0.0);
        assert_eq!(report.ping_bin_edges[50], 30.0);
        for t in &report.targets {
            assert_eq!(t.max_histo.len(), 50);
            assert_eq!(t.avg_histo.len(), 50);
            assert_eq!(t.jitter_histo.len(), 50);
            assert_eq!(t.max_histo.iter().sum::<u64>(), 2);
        }
        // target b's 30 ms lands in the closed last bin
        assert_eq!(report.targets[1].max_histo[49], 1);
    }

    #[test]
    fn empty_target_does_not_collapse_range() {
        let store = store_with(&[("quiet", vec![]), ("busy", vec![12.0, 18.0])]);
        let report = compute(&store, PARAMS);
        assert_eq!(report.ping_bin_edges[50], 18.0);
        assert_eq!(report.targets[0].samples, 0);
        assert_eq!(report.targets[0].max_histo, vec![0; 50]);
        assert!(!report.targets[0].percentiles.has_data());
    }

    #[test]
    fn all_empty_is_degenerate_not_fatal() {
        let store = store_with(&[("a", vec![]), ("b", vec![])]);
        let report = compute(&store, PARAMS);
        assert_eq!(report.ping_bin_edges.len(), 51);
        assert!(report.targets.iter().all(|t| t.max_histo.iter().all(|c| *c == 0)));
        assert_eq!(report.throughput.samples, 0);
        assert_eq!(report.throughput.download_histo, vec![0; 50]);
        assert_eq!(report.throughput.bin_edges.len(), 51);
    }

    #[test]
    fn only_trailing_window_is_binned() {
        let store = store_with(&[("a", vec![100.0, 100.0, 4.0, 6.0])]);
        let params = StatisticsParams { latency_window: 2, ..PARAMS };
        let report = compute(&store, params);
        assert_eq!(report.ping_bin_edges[50], 6.0);
        assert_eq!(report.targets[0].samples, 2);
        assert_eq!(report.targets[0].max_histo.iter().sum::<u64>(), 2);
    }

    #[test]
    fn smoothed_columns_fit_the_max_axis() {
        let targets = vec!["h".to_string()];
        let mut store = SeriesStore::new(&targets);
        let series = store.latency_mut("h").unwrap();
        for (i, v) in [10.0, 0.0, 20.0, 0.0, 15.0, 30.0, 12.0].iter().enumerate() {
            let now = start().checked_add(Duration::seconds(i as i64)).unwrap();
            series.push(now, &Ok(*v), 5);
        }
        let report = compute(&store, PARAMS);
        let t = &report.targets[0];
        assert_eq!(t.avg_histo.iter().sum::<u64>(), 7);
        assert_eq!(t.jitter_histo.iter().sum::<u64>(), 7);
        assert_eq!(t.max_histo.iter().sum::<u64>(), 7);
        assert!(t.error_score > 0);
    }

    #[test]
    fn throughput_upload_reuses_download_edges() {
        let mut store = store_with(&[("a", vec![1.0])]);
        let tp = store.throughput_mut();
        tp.push(start(), 80.0, 20.0);
        tp.push(start(), 100.0, 25.0);
        let params = StatisticsParams { throughput_window: 2, ..PARAMS };
        let report = compute(&store, params);

        let edges = &report.throughput.bin_edges;
        assert_eq!(edges.len(), 51);
        assert_eq!(edges[0], 80.0);
        assert_eq!(edges[50], 100.0);
        assert_eq!(report.throughput.download_histo.iter().sum::<u64>(), 2);
        // uploads fall below the download range
        assert_eq!(report.throughput.upload_histo.iter().sum::<u64>(), 0);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let store = store_with(&[("a", vec![3.0, 9.0, 0.0]), ("b", vec![7.0])]);
        assert_eq!(compute(&store, PARAMS), compute(&store, PARAMS));
    }
}
