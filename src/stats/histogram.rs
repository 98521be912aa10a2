use serde::Serialize;

/// Fixed-width binned counts. `edges.len() == counts.len() + 1`.
///
/// Bins are half-open `[a, b)` except the last, which also includes its
/// upper edge. Values outside `[edges[0], edges[last]]` are not counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// `bins` equal-width bins over `[lo, hi]`. A zero-width range is
    /// widened to `[lo - 0.5, hi + 0.5]`.
    pub fn with_range(data: &[f64], bins: usize, lo: f64, hi: f64) -> Self {
        let edges = uniform_edges(bins, lo, hi);
        Self::with_edges(data, &edges)
    }

    /// `bins` equal-width bins spanning the data's own `[min, max]`.
    /// Empty data falls back to `[0, 1]`.
    pub fn auto(data: &[f64], bins: usize) -> Self {
        let finite = data.iter().copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 1.0));
        Self::with_range(data, bins, lo, hi)
    }

    /// Count `data` into caller-supplied edges (at least two, ascending).
    pub fn with_edges(data: &[f64], edges: &[f64]) -> Self {
        let bins = edges.len().saturating_sub(1);
        let mut counts = vec![0u64; bins];

        if let (Some(&first), Some(&last)) = (edges.first(), edges.last()) {
            for &v in data {
                if bins == 0 || !(v >= first && v <= last) {
                    continue;
                }
                // Index of the last edge <= v, clamped into the closed last bin
                let idx = edges.partition_point(|e| *e <= v).saturating_sub(1);
                counts[idx.min(bins - 1)] += 1;
            }
        }

        Self { bin_edges: edges.to_vec(), counts }
    }
}

fn uniform_edges(bins: usize, lo: f64, hi: f64) -> Vec<f64> {
    let bins = bins.max(1);
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect()
}
