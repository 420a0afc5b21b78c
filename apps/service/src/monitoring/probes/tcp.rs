use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::target::host_and_port;
use super::{Probe, ProbeRequest, elapsed_ms};
use crate::monitoring::types::CheckResult;

/// TCP port checker
pub struct TcpProbe {
    timeout_duration: Duration,
}

impl TcpProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult {
        let (host, port) = match host_and_port(request.target, None) {
            Ok(parts) => parts,
            Err(error) => return CheckResult::offline(0, format!("Invalid TCP target: {error}")),
        };

        let start = Instant::now();
        match timeout(self.timeout_duration, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_stream)) => CheckResult::online(elapsed_ms(start), format!("Connected to {host}:{port}")),
            Ok(Err(error)) => CheckResult::offline(elapsed_ms(start), format!("TCP connection failed: {error}")),
            Err(_) => CheckResult::offline(
                elapsed_ms(start),
                format!("TCP connection timed out after {}s", self.timeout_duration.as_secs_f32()),
            ),
        }
    }
}
