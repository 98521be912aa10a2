use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;

use super::LatencyProbe;
use crate::error::ProbeError;

/// Latency via the platform `ping` binary.
///
/// Sends `count` echo requests and averages every reply after the first,
/// since the first one regularly absorbs DNS / ARP warm-up.
#[derive(Debug, Clone)]
pub struct SystemPing {
    pub count: u32,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self { count: 2 }
    }
}

impl SystemPing {
    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new("ping");
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        cmd.arg(count_flag)
            .arg(self.count.to_string())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // The recorder's timeout drops this future; take the child with it
            .kill_on_drop(true);
        cmd
    }
}

impl LatencyProbe for SystemPing {
    fn measure(&self, target: &str) -> impl Future<Output = Result<f64, ProbeError>> + Send {
        let mut cmd = self.command(target);
        async move {
            let output = cmd.output().await?;
            if !output.status.success() {
                return Err(ProbeError::ExitStatus(output.status));
            }
            let text = String::from_utf8_lossy(&output.stdout);
            average_reply_time(&parse_reply_times(&text))
        }
    }
}

/// Every `time=` / `time<` field in ping output, in milliseconds.
pub fn parse_reply_times(output: &str) -> Vec<f64> {
    let mut times = Vec::new();
    let mut rest = output;

    while let Some(pos) = rest.find("time") {
        rest = &rest[pos + 4..];
        let (below, tail) = match rest.chars().next() {
            Some('=') => (false, &rest[1..]),
            Some('<') => (true, &rest[1..]),
            _ => continue,
        };

        let number: String = tail
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(ms) = number.parse::<f64>() {
            // "time<1ms" is a sub-resolution reply, not a failure
            times.push(if below { ms.max(f64::EPSILON) } else { ms });
        }
    }

    times
}

fn average_reply_time(times: &[f64]) -> Result<f64, ProbeError> {
    let usable = if times.len() > 1 { &times[1..] } else { times };
    if usable.is_empty() {
        return Err(ProbeError::parse("no replies in ping output"));
    }
    Ok(usable.iter().sum::<f64>() / usable.len() as f64)
}
