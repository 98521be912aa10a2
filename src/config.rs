use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

// ─── Environment overrides ───────────────────────────────────────

pub const ENV_CONFIG_PATH: &str = "PING_RECORDER_CONFIG";
const ENV_TARGETS: &str = "PING_RECORDER_TARGETS";
const ENV_BIND: &str = "PING_RECORDER_BIND";
const ENV_PROBE_MODE: &str = "PING_RECORDER_PROBE_MODE";

// ─── Duration bounds ─────────────────────────────────────────────

/// Longest duration any field may describe (100 years). Fits both
/// `std::time::Duration` and `chrono::Duration` with room to spare.
const MAX_DURATION_SECS: i64 = 100 * 365 * 24 * 3600;

/// `tokio::time::interval` rejects a zero period.
const MIN_PING_INTERVAL_SECS: f64 = 0.001;

// ─── Types ───────────────────────────────────────────────────────

/// Which collaborators feed the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Shell out to `ping` and the configured bandwidth tool.
    System,
    /// Seeded synthetic measurements, no network access.
    Simulated,
}

/// Static recorder configuration. Read once at startup, never reloaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecorderConfig {
    /// Hosts whose latency is sampled, in display order
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Recorder tick cadence
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: f64,

    /// Smoothing window width
    #[serde(default = "default_ping_kernel")]
    pub ping_kernel_seconds: f64,

    /// Throughput probe cadence
    #[serde(default = "default_speed_interval")]
    pub speed_interval_minutes: f64,

    /// Trailing window used for histograms
    #[serde(default = "default_statistics_kernel")]
    pub statistics_kernel_hours: f64,

    /// History older than this is evicted
    #[serde(default = "default_retention")]
    pub retention_hours: f64,

    #[serde(default = "default_bins")]
    pub histogram_bins: usize,

    #[serde(default = "default_latency_timeout")]
    pub latency_timeout_seconds: f64,

    #[serde(default = "default_throughput_timeout")]
    pub throughput_timeout_seconds: f64,

    #[serde(default = "default_probe_mode")]
    pub probe_mode: ProbeMode,

    /// Program + args printing `{"download": bps, "upload": bps}` JSON
    #[serde(default = "default_throughput_command")]
    pub throughput_command: Vec<String>,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SSE push cadence for `/api/statistics/stream`
    #[serde(default = "default_stream_interval")]
    pub stream_interval_ms: u64,
}

fn default_targets() -> Vec<String> {
    ["google.com", "example.com", "openai.com"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_ping_interval() -> f64 {
    1.0
}
fn default_ping_kernel() -> f64 {
    10.0
}
fn default_speed_interval() -> f64 {
    30.0
}
fn default_statistics_kernel() -> f64 {
    0.5
}
fn default_retention() -> f64 {
    240.0
}
fn default_bins() -> usize {
    50
}
fn default_latency_timeout() -> f64 {
    2.0
}
fn default_throughput_timeout() -> f64 {
    120.0
}
fn default_probe_mode() -> ProbeMode {
    ProbeMode::System
}
fn default_throughput_command() -> Vec<String> {
    vec!["speedtest-cli".into(), "--json".into()]
}
fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}
fn default_stream_interval() -> u64 {
    1000
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            ping_interval_seconds: default_ping_interval(),
            ping_kernel_seconds: default_ping_kernel(),
            speed_interval_minutes: default_speed_interval(),
            statistics_kernel_hours: default_statistics_kernel(),
            retention_hours: default_retention(),
            histogram_bins: default_bins(),
            latency_timeout_seconds: default_latency_timeout(),
            throughput_timeout_seconds: default_throughput_timeout(),
            probe_mode: default_probe_mode(),
            throughput_command: default_throughput_command(),
            bind_addr: default_bind_addr(),
            stream_interval_ms: default_stream_interval(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────

impl RecorderConfig {
    /// Defaults, overlaid by the TOML file named in `PING_RECORDER_CONFIG`
    /// (if set), overlaid by the individual env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env(|var| std::env::var(var).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `lookup` is injected so tests don't have to mutate the process env.
    fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(list) = lookup(ENV_TARGETS) {
            self.targets = list
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(addr) = lookup(ENV_BIND) {
            self.bind_addr = addr;
        }
        if let Some(mode) = lookup(ENV_PROBE_MODE) {
            self.probe_mode = match mode.to_ascii_lowercase().as_str() {
                "system" => ProbeMode::System,
                "simulated" => ProbeMode::Simulated,
                other => {
                    return Err(ConfigError::Env {
                        var: ENV_PROBE_MODE,
                        message: format!("unknown probe mode \"{other}\""),
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for (i, t) in self.targets.iter().enumerate() {
            if t.trim().is_empty() {
                return Err(ConfigError::EmptyTarget);
            }
            if self.targets[..i].contains(t) {
                return Err(ConfigError::DuplicateTarget(t.clone()));
            }
        }

        // (field, value, seconds per unit, unit name)
        let durations = [
            ("ping_interval_seconds", self.ping_interval_seconds, 1.0, "seconds"),
            ("ping_kernel_seconds", self.ping_kernel_seconds, 1.0, "seconds"),
            ("speed_interval_minutes", self.speed_interval_minutes, 60.0, "minutes"),
            ("statistics_kernel_hours", self.statistics_kernel_hours, 3600.0, "hours"),
            ("retention_hours", self.retention_hours, 3600.0, "hours"),
            ("latency_timeout_seconds", self.latency_timeout_seconds, 1.0, "seconds"),
            ("throughput_timeout_seconds", self.throughput_timeout_seconds, 1.0, "seconds"),
        ];
        for (field, value, scale, unit) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
            let max = MAX_DURATION_SECS as f64 / scale;
            let min = if field == "ping_interval_seconds" {
                MIN_PING_INTERVAL_SECS
            } else {
                0.0
            };
            if value > max || value < min {
                return Err(ConfigError::OutOfRange { field, value, min, max, unit });
            }
        }

        if self.histogram_bins == 0 {
            return Err(ConfigError::NoBins);
        }
        if self.throughput_command.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(())
    }

    // ── Derived tick counts ─────────────────────────────────────

    // Conversions saturate at the validation bounds, so a config that
    // skipped `validate` still can't panic here.

    pub fn ping_interval(&self) -> Duration {
        std_duration(self.ping_interval_seconds).max(Duration::from_millis(1))
    }

    pub fn latency_timeout(&self) -> Duration {
        std_duration(self.latency_timeout_seconds)
    }

    pub fn throughput_timeout(&self) -> Duration {
        std_duration(self.throughput_timeout_seconds)
    }

    pub fn retention(&self) -> chrono::Duration {
        let secs = i64::try_from(whole(self.retention_hours * 3600.0))
            .unwrap_or(i64::MAX)
            .min(MAX_DURATION_SECS);
        chrono::Duration::seconds(secs)
    }

    /// Smoothing kernel `K`, in samples (never below 1).
    pub fn kernel_ticks(&self) -> usize {
        whole(self.ping_kernel_seconds / self.ping_interval_seconds).max(1)
    }

    /// Latency ticks between two throughput probes (never below 1).
    pub fn speed_interval_ticks(&self) -> u64 {
        whole(self.speed_interval_minutes * 60.0 / self.ping_interval_seconds).max(1)
            as u64
    }

    /// Trailing latency samples fed into the histograms.
    pub fn statistics_window(&self) -> usize {
        whole(self.statistics_kernel_hours * 3600.0 / self.ping_interval_seconds)
    }

    /// Trailing throughput samples fed into the histograms.
    pub fn throughput_statistics_window(&self) -> usize {
        whole(self.statistics_kernel_hours * 60.0 / self.speed_interval_minutes)
    }
}

fn std_duration(secs: f64) -> Duration {
    let cap = Duration::from_secs(MAX_DURATION_SECS.unsigned_abs());
    Duration::try_from_secs_f64(secs).map_or(cap, |d| d.min(cap))
}

/// Floor that tolerates ratios like `1/60 * 60` landing a hair under 1.
fn whole(x: f64) -> usize {
    (x + 1e-9).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RecorderConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.targets.len(), 3);
        assert_eq!(cfg.kernel_ticks(), 10);
        assert_eq!(cfg.speed_interval_ticks(), 1800);
        assert_eq!(cfg.statistics_window(), 1800);
        assert_eq!(cfg.throughput_statistics_window(), 1);
        assert_eq!(cfg.retention(), chrono::Duration::hours(240));
        assert_eq!(cfg.histogram_bins, 50);
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let cfg = RecorderConfig::from_toml(
            r#"
            targets = ["10.0.0.1", "router.lan"]
            ping_interval_seconds = 2
            probe_mode = "simulated"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.targets, vec!["10.0.0.1", "router.lan"]);
        assert_eq!(cfg.probe_mode, ProbeMode::Simulated);
        assert_eq!(cfg.kernel_ticks(), 5);
        assert_eq!(cfg.speed_interval_ticks(), 900);
        assert_eq!(cfg.histogram_bins, 50);
    }

    #[test]
    fn example_file_parses() {
        let cfg = RecorderConfig::from_toml(include_str!("../config.example.toml")).unwrap();
        assert_eq!(cfg.targets, RecorderConfig::default().targets);
        assert_eq!(cfg.throughput_command, vec!["speedtest-cli", "--json"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RecorderConfig::from_toml("ping_every = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_duplicate_and_empty_targets() {
        let err = RecorderConfig::from_toml(r#"targets = ["a", "b", "a"]"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTarget(t) if t == "a"));

        let err = RecorderConfig::from_toml("targets = []").unwrap_err();
        assert!(matches!(err, ConfigError::NoTargets));

        let err = RecorderConfig::from_toml(r#"targets = [" "]"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTarget));
    }

    #[test]
    fn rejects_non_positive_durations() {
        let err = RecorderConfig::from_toml("ping_interval_seconds = 0")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive { field: "ping_interval_seconds", .. }
        ));
        let err = RecorderConfig::from_toml("histogram_bins = 0").unwrap_err();
        assert!(matches!(err, ConfigError::NoBins));
    }

    #[test]
    fn rejects_durations_that_cannot_be_represented() {
        for raw in [
            "retention_hours = 1e20",
            "retention_hours = 1e13",
            "ping_interval_seconds = 1e30",
            "throughput_timeout_seconds = 1e300",
            "speed_interval_minutes = 1e18",
        ] {
            let err = RecorderConfig::from_toml(raw).unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { .. }), "{raw}: {err}");
        }

        let err = RecorderConfig::from_toml("ping_interval_seconds = 1e-9").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "ping_interval_seconds", .. }
        ));
    }

    #[test]
    fn longest_accepted_retention_still_keeps_history() {
        let cfg = RecorderConfig::from_toml("retention_hours = 876000").unwrap();
        assert_eq!(cfg.retention(), chrono::Duration::hours(876_000));
        assert!(cfg.retention() > chrono::Duration::zero());
    }

    #[test]
    fn conversions_saturate_instead_of_panicking() {
        // Bypasses `validate` on purpose
        let cfg = RecorderConfig {
            retention_hours: 1e20,
            ping_interval_seconds: 1e30,
            latency_timeout_seconds: f64::INFINITY,
            throughput_timeout_seconds: 1e-12,
            ..RecorderConfig::default()
        };
        let cap = chrono::Duration::seconds(MAX_DURATION_SECS);
        assert_eq!(cfg.retention(), cap);
        assert_eq!(cfg.ping_interval(), Duration::from_secs(MAX_DURATION_SECS as u64));
        assert_eq!(cfg.latency_timeout(), Duration::from_secs(MAX_DURATION_SECS as u64));
        assert_eq!(cfg.throughput_timeout(), Duration::ZERO);

        let tiny = RecorderConfig { ping_interval_seconds: 1e-12, ..RecorderConfig::default() };
        assert_eq!(tiny.ping_interval(), Duration::from_millis(1));
    }

    #[test]
    fn kernel_never_drops_below_one_sample() {
        let cfg = RecorderConfig {
            ping_interval_seconds: 5.0,
            ping_kernel_seconds: 1.0,
            ..RecorderConfig::default()
        };
        assert_eq!(cfg.kernel_ticks(), 1);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = RecorderConfig::default();
        cfg.apply_env(|var| match var {
            ENV_TARGETS => Some("a.example, b.example,".into()),
            ENV_BIND => Some("127.0.0.1:9000".into()),
            ENV_PROBE_MODE => Some("Simulated".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.targets, vec!["a.example", "b.example"]);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.probe_mode, ProbeMode::Simulated);

        let err = cfg
            .apply_env(|var| (var == ENV_PROBE_MODE).then(|| "icmp".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_PROBE_MODE, .. }));
    }
}
