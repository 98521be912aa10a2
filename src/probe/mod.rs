//! Measurement collaborators consumed by the recorder.
//!
//! A probe reports success or a `ProbeError`; it never panics and never
//! substitutes sentinel values itself. Turning a failure into the latency
//! sentinel (or a skipped throughput append) is the series layer's job.

pub mod ping;
pub mod simulated;
pub mod speedtest;

use std::future::Future;

use crate::error::ProbeError;

pub use ping::SystemPing;
pub use simulated::{SimulatedLatency, SimulatedThroughput};
pub use speedtest::CommandThroughput;

/// Round-trip latency to one host, in milliseconds.
pub trait LatencyProbe: Send + Sync + 'static {
    fn measure(&self, target: &str) -> impl Future<Output = Result<f64, ProbeError>> + Send;
}

/// Download / upload throughput, in Mbps.
pub trait ThroughputProbe: Send + Sync + 'static {
    fn measure(&self) -> impl Future<Output = Result<Throughput, ProbeError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}
