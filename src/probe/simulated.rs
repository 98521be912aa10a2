use std::future::{self, Future};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::{LatencyProbe, Throughput, ThroughputProbe};
use crate::error::ProbeError;

/// Synthetic latency for offline runs and demos. Deterministic per seed.
///
/// Each target gets a stable baseline derived from its name; samples wander
/// around it with occasional spikes and a small failure rate.
pub struct SimulatedLatency {
    rng: Mutex<StdRng>,
    failure_rate: f64,
}

impl SimulatedLatency {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failure_rate: 0.02,
        }
    }

    #[cfg(test)]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn sample(&self, target: &str) -> Result<f64, ProbeError> {
        let baseline = 8.0 + (name_hash(target) % 60) as f64;
        let mut rng = self.rng.lock();

        if rng.gen_bool(self.failure_rate) {
            return Err(ProbeError::Timeout(std::time::Duration::ZERO));
        }
        let noise = rng.gen_range(-0.15..0.15) * baseline;
        let spike = if rng.gen_bool(0.03) {
            rng.gen_range(2.0..6.0) * baseline
        } else {
            0.0
        };
        Ok((baseline + noise + spike).max(0.1))
    }
}

impl LatencyProbe for SimulatedLatency {
    fn measure(&self, target: &str) -> impl Future<Output = Result<f64, ProbeError>> + Send {
        future::ready(self.sample(target))
    }
}

/// Synthetic throughput around a fixed line rate.
pub struct SimulatedThroughput {
    rng: Mutex<StdRng>,
    download_mbps: f64,
    upload_mbps: f64,
}

impl SimulatedThroughput {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            download_mbps: 300.0,
            upload_mbps: 40.0,
        }
    }
}

impl ThroughputProbe for SimulatedThroughput {
    fn measure(&self) -> impl Future<Output = Result<Throughput, ProbeError>> + Send {
        let mut rng = self.rng.lock();
        let t = Throughput {
            download_mbps: self.download_mbps * rng.gen_range(0.6..1.05),
            upload_mbps: self.upload_mbps * rng.gen_range(0.6..1.05),
        };
        future::ready(Ok(t))
    }
}

/// FNV-1a, so baselines don't depend on `std`'s randomized hasher.
fn name_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_seed_same_samples() {
        let a = SimulatedLatency::new(7);
        let b = SimulatedLatency::new(7);
        for _ in 0..20 {
            let x = a.measure("example.com").await.ok();
            let y = b.measure("example.com").await.ok();
            assert_eq!(x, y);
        }
    }

    #[tokio::test]
    async fn samples_are_positive_or_failures() {
        let p = SimulatedLatency::new(1).with_failure_rate(0.5);
        let mut failures = 0;
        for _ in 0..200 {
            match p.measure("router.lan").await {
                Ok(ms) => assert!(ms > 0.0),
                Err(_) => failures += 1,
            }
        }
        assert!(failures > 0 && failures < 200);
    }

    #[tokio::test]
    async fn throughput_stays_near_line_rate() {
        let p = SimulatedThroughput::new(3);
        let t = p.measure().await.unwrap();
        assert!(t.download_mbps > 100.0 && t.download_mbps < 400.0);
        assert!(t.upload_mbps > 10.0 && t.upload_mbps < 50.0);
    }
}
