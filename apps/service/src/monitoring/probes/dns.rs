use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::target::host_of;
use super::{Probe, ProbeRequest, elapsed_ms};
use crate::monitoring::types::{CheckResult, ProbeData};

/// DNS resolution checker
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
    timeout_duration: Duration,
}

impl DnsProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        let (config, mut options) = hickory_resolver::system_conf::read_system_conf().unwrap_or_else(|error| {
            warn!(%error, "Could not read system resolver configuration, using defaults");
            (ResolverConfig::default(), ResolverOpts::default())
        });
        options.timeout = timeout_duration;
        options.attempts = 1;

        Self { resolver: TokioAsyncResolver::tokio(config, options), timeout_duration }
    }

    /// A records, then AAAA, then whatever the generic lookup yields
    async fn resolve(&self, host: &str) -> Vec<String> {
        match self.resolver.ipv4_lookup(host).await {
            Ok(lookup) => {
                let addresses: Vec<String> = lookup.iter().map(|record| record.0.to_string()).collect();
                if !addresses.is_empty() {
                    return addresses;
                }
            }
            Err(error) => debug!(host, %error, "A lookup failed"),
        }

        match self.resolver.ipv6_lookup(host).await {
            Ok(lookup) => {
                let addresses: Vec<String> = lookup.iter().map(|record| record.0.to_string()).collect();
                if !addresses.is_empty() {
                    return addresses;
                }
            }
            Err(error) => debug!(host, %error, "AAAA lookup failed"),
        }

        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().map(|ip| ip.to_string()).collect(),
            Err(error) => {
                debug!(host, %error, "Generic lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl Probe for DnsProbe {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult {
        let host = match host_of(request.target) {
            Ok(host) => host,
            Err(error) => return CheckResult::offline(0, format!("Invalid DNS target: {error}")),
        };

        if let Ok(ip) = host.parse::<IpAddr>() {
            return CheckResult::online(0, format!("{host} is an IP address"))
                .with_data(ProbeData::Dns { addresses: vec![ip.to_string()] });
        }

        let start = Instant::now();
        // Three sequential lookups share one budget.
        let addresses = timeout(self.timeout_duration * 3, self.resolve(&host)).await.unwrap_or_default();
        let latency = elapsed_ms(start);

        if addresses.is_empty() {
            return CheckResult::offline(latency, format!("Could not resolve {host}"));
        }

        CheckResult::online(latency, format!("Resolved {host} to {}", addresses.join(", ")))
            .with_data(ProbeData::Dns { addresses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ServiceStatus;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn ip_literals_resolve_to_themselves() {
        let headers = BTreeMap::new();
        let result = DnsProbe::new(Duration::from_secs(1)).probe(&ProbeRequest::new("192.0.2.10", &headers)).await;

        assert_eq!(result.status, ServiceStatus::Online);
        assert_eq!(result.data, Some(ProbeData::Dns { addresses: vec!["192.0.2.10".to_string()] }));
    }

    #[tokio::test]
    async fn reserved_tld_does_not_resolve() {
        let headers = BTreeMap::new();
        let result = DnsProbe::new(Duration::from_secs(1))
            .probe(&ProbeRequest::new("upkeep-probe.invalid", &headers))
            .await;

        assert_eq!(result.status, ServiceStatus::Offline);
        assert!(result.message.contains("upkeep-probe.invalid"));
    }
}
