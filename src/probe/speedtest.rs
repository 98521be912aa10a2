use std::future::Future;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use super::{Throughput, ThroughputProbe};
use crate::error::ProbeError;

const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Throughput via an external bandwidth tool that prints one JSON object
/// with `download` and `upload` in bits per second (`speedtest-cli --json`
/// and compatible wrappers).
#[derive(Debug, Clone)]
pub struct CommandThroughput {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SpeedReport {
    download: f64,
    upload: f64,
}

impl CommandThroughput {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl ThroughputProbe for CommandThroughput {
    fn measure(&self) -> impl Future<Output = Result<Throughput, ProbeError>> + Send {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        async move {
            let output = cmd.output().await?;
            if !output.status.success() {
                return Err(ProbeError::ExitStatus(output.status));
            }
            parse_report(&output.stdout)
        }
    }
}

fn parse_report(stdout: &[u8]) -> Result<Throughput, ProbeError> {
    let report: SpeedReport = serde_json::from_slice(stdout)?;
    for v in [report.download, report.upload] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(ProbeError::InvalidValue(v));
        }
    }
    Ok(Throughput {
        download_mbps: report.download / BITS_PER_MEGABIT,
        upload_mbps: report.upload / BITS_PER_MEGABIT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bits_to_megabits() {
        let json = br#"{"download": 94250000.5, "upload": 11800000.0,
                        "ping": 14.2, "server": {"name": "Somewhere"}}"#;
        let t = parse_report(json).unwrap();
        assert!((t.download_mbps - 94.2500005).abs() < 1e-9);
        assert!((t.upload_mbps - 11.8).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage_and_negative_rates() {
        assert!(matches!(parse_report(b"ERROR: no servers"), Err(ProbeError::Parse(_))));
        assert!(matches!(
            parse_report(br#"{"download": -1, "upload": 5}"#),
            Err(ProbeError::InvalidValue(_))
        ));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandThroughput::new(&[]).is_none());
        let c = CommandThroughput::new(&["speedtest-cli".into(), "--json".into()]).unwrap();
        assert_eq!(c.program, "speedtest-cli");
        assert_eq!(c.args, vec!["--json"]);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let probe = CommandThroughput::new(&["definitely-not-a-speedtest-binary".into()]).unwrap();
        assert!(matches!(probe.measure().await, Err(ProbeError::Spawn(_))));
    }
}
