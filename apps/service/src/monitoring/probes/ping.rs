use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use super::target::host_of;
use super::{Probe, ProbeRequest, elapsed_ms};
use crate::monitoring::types::CheckResult;

static ROUND_TRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)time[=<]\s*([0-9]+(?:[.,][0-9]+)?)\s*ms").expect("valid regex"));
static NO_LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b0(?:\.0+)?% (?:packet )?loss").expect("valid regex"));

/// What a ping run printed, reduced to what the status needs
#[derive(Debug, Clone, PartialEq)]
pub struct PingReply {
    pub reachable: bool,
    pub round_trip_ms: Option<f64>,
}

/// Parse the output of the system `ping` utility (Linux, BSD/macOS and Windows formats)
pub fn parse_ping_output(output: &str) -> PingReply {
    let lowered = output.to_lowercase();
    let round_trip_ms = ROUND_TRIP
        .captures(output)
        .and_then(|captures| captures[1].replace(',', ".").parse::<f64>().ok());

    let reachable = lowered.contains("ttl=")
        || lowered.contains("bytes from")
        || NO_LOSS.is_match(&lowered)
        || round_trip_ms.is_some();

    PingReply { reachable, round_trip_ms }
}

/// ICMP checker driving the platform `ping` binary
pub struct PingProbe {
    timeout_duration: Duration,
}

impl PingProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }

    fn command(&self, host: &str) -> Command {
        let seconds = self.timeout_duration.as_secs().max(1);
        let mut command = Command::new("ping");
        if cfg!(target_os = "windows") {
            command.args(["-n", "1", "-w", &(seconds * 1000).to_string(), host]);
        } else if cfg!(target_os = "macos") {
            command.args(["-c", "1", "-t", &seconds.to_string(), host]);
        } else {
            command.args(["-c", "1", "-W", &seconds.to_string(), host]);
        }
        command.kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl Probe for PingProbe {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult {
        let host = match host_of(request.target) {
            Ok(host) => host,
            Err(error) => return CheckResult::offline(0, format!("Invalid ping target: {error}")),
        };
        if host.starts_with('-') {
            return CheckResult::offline(0, format!("Invalid ping target: {host}"));
        }

        let start = Instant::now();
        // The utility enforces its own timeout; this guards against it hanging.
        let output = match timeout(self.timeout_duration + Duration::from_secs(2), self.command(&host).output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => return CheckResult::offline(elapsed_ms(start), format!("Failed to run ping: {error}")),
            Err(_) => return CheckResult::timeout(elapsed_ms(start), format!("Ping to {host} timed out")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply = parse_ping_output(&stdout);

        if !output.status.success() || !reply.reachable {
            return CheckResult::offline(elapsed_ms(start), format!("{host} did not answer ping"));
        }

        let latency = reply.round_trip_ms.map(|ms| ms.round() as u64).unwrap_or_else(|| elapsed_ms(start));
        CheckResult::online(latency, format!("Reply from {host} in {latency} ms"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_output() {
        let output = "PING example.com (93.184.216.34) 56(84) bytes of data.\n\
            64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time=11.6 ms\n\n\
            --- example.com ping statistics ---\n\
            1 packets transmitted, 1 received, 0% packet loss, time 0ms\n";
        assert_eq!(parse_ping_output(output), PingReply { reachable: true, round_trip_ms: Some(11.6) });
    }

    #[test]
    fn parses_windows_output() {
        let output = "Reply from 93.184.216.34: bytes=32 time<1ms TTL=56\n\
            Packets: Sent = 1, Received = 1, Lost = 0 (0% loss),";
        assert_eq!(parse_ping_output(output), PingReply { reachable: true, round_trip_ms: Some(1.0) });
    }

    #[test]
    fn total_loss_is_unreachable() {
        let output = "PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.\n\n\
            --- 10.255.255.1 ping statistics ---\n\
            1 packets transmitted, 0 received, 100% packet loss, time 0ms\n";
        assert_eq!(parse_ping_output(output), PingReply { reachable: false, round_trip_ms: None });
    }

    #[test]
    fn garbage_is_unreachable() {
        assert!(!parse_ping_output("ping: unknown host").reachable);
        assert!(!parse_ping_output("").reachable);
    }

    #[tokio::test]
    async fn option_like_hosts_are_rejected() {
        let headers = std::collections::BTreeMap::new();
        let result = PingProbe::new(Duration::from_secs(1)).probe(&ProbeRequest::new("-f", &headers)).await;
        assert_eq!(result.status, crate::monitoring::types::ServiceStatus::Offline);
    }
}
