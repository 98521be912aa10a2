//! Rolling avg/max/jitter/error-score over the trailing latency kernel.
//!
//! A raw value of `0.0` means the measurement failed. Failed samples are
//! counted into an error score (10 per failure) and then masked with the
//! window maximum so they don't drag the average or min toward zero.

use serde::Serialize;

/// Weight applied to each failed sample in the window.
pub const ERROR_WEIGHT: u32 = 10;

/// The derived tuple appended to a latency series on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Smoothed {
    pub avg: f64,
    pub max: f64,
    pub jitter: f64,
    pub error_count: u32,
}

/// Smooth the trailing `kernel` values of `raw` (which already holds the
/// current tick's value as its last element).
///
/// An empty input yields all zeros.
pub fn smooth<I>(raw: I, kernel: usize) -> Smoothed
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    let iter = raw.into_iter();
    let winsize = iter.len().min(kernel);
    let window: Vec<f64> = iter.rev().take(winsize).collect();

    if window.is_empty() {
        return Smoothed { avg: 0.0, max: 0.0, jitter: 0.0, error_count: 0 };
    }

    let failures = window.iter().filter(|v| **v == 0.0).count() as u32;
    let error_count = failures * ERROR_WEIGHT;

    // Max is taken before masking
    let data_max = window.iter().copied().fold(f64::MIN, f64::max);

    let masked = window.iter().map(|&v| {
        if error_count > 0 && v == 0.0 {
            data_max
        } else {
            v
        }
    });

    let (mut data_min, mut sum) = (f64::MAX, 0.0);
    for v in masked {
        data_min = data_min.min(v);
        sum += v;
    }
    let data_avg = sum / window.len() as f64;

    Smoothed {
        avg: data_avg,
        max: data_max,
        jitter: data_max - data_min,
        error_count,
    }
}
