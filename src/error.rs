use std::time::Duration;

use thiserror::Error;

// ─── Configuration errors ────────────────────────────────────────

/// Everything that can go wrong while building a `RecorderConfig`.
/// Startup aborts on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("at least one target is required")]
    NoTargets,

    #[error("duplicate target \"{0}\"")]
    DuplicateTarget(String),

    #[error("target names must not be empty")]
    EmptyTarget,

    #[error("{field} must be a positive, finite number (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must lie between {min} and {max} {unit} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
        unit: &'static str,
    },

    #[error("histogram_bins must be at least 1")]
    NoBins,

    #[error("throughput_command must name a program")]
    EmptyCommand,

    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
}

// ─── Measurement errors ──────────────────────────────────────────

/// A single failed measurement. The recorder absorbs these: latency
/// failures become the zero sentinel, throughput failures skip the append.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot launch probe command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("probe command exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("cannot parse probe output: {0}")]
    Parse(String),

    #[error("probe returned an unusable value: {0}")]
    InvalidValue(f64),

    #[error("probe task aborted: {0}")]
    Join(String),
}

impl ProbeError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
