use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::probes::{DnsProbe, HttpProbe, PingProbe, Probe, ProbeRequest, TcpProbe, TlsProbe};
use super::types::{CheckResult, ServiceType};
use crate::config::ProbeSettings;
use crate::database::models::Service;

/// Probe executor - runs the probe matching a service's type
pub struct ProbeExecutor {
    http_probe: HttpProbe,
    ping_probe: PingProbe,
    dns_probe: DnsProbe,
    tcp_probe: TcpProbe,
    tls_probe: TlsProbe,
}

impl ProbeExecutor {
    /// Create a new probe executor
    pub fn new(settings: &ProbeSettings) -> Result<Self> {
        let seconds = Duration::from_secs;
        Ok(Self {
            http_probe: HttpProbe::new(seconds(settings.http_timeout_seconds), &settings.user_agent)?
                .with_slow_threshold(settings.slow_response_threshold_ms),
            ping_probe: PingProbe::new(seconds(settings.ping_timeout_seconds)),
            dns_probe: DnsProbe::new(seconds(settings.dns_timeout_seconds)),
            tcp_probe: TcpProbe::new(seconds(settings.tcp_timeout_seconds)),
            tls_probe: TlsProbe::new(seconds(settings.tls_timeout_seconds))?,
        })
    }

    fn probe_for(&self, service_type: ServiceType) -> &dyn Probe {
        match service_type {
            ServiceType::Http | ServiceType::Https => &self.http_probe,
            ServiceType::Ping => &self.ping_probe,
            ServiceType::Dns => &self.dns_probe,
            ServiceType::Tcp => &self.tcp_probe,
            ServiceType::Ssl => &self.tls_probe,
        }
    }

    /// Run the primary check for a service
    pub async fn execute(&self, service: &Service) -> CheckResult {
        self.execute_at(service, Utc::now()).await
    }

    /// Run the primary check, measuring certificate lifetimes from `now`
    pub async fn execute_at(&self, service: &Service, now: DateTime<Utc>) -> CheckResult {
        let request = ProbeRequest::new(&service.target, &service.headers)
            .with_content_pattern(service.content_match_pattern.as_deref())
            .at(now);
        self.probe_for(service.service_type).probe(&request).await
    }

    /// Inspect the certificate served at a service's target, whatever its type
    pub async fn inspect_certificate(&self, service: &Service, now: DateTime<Utc>) -> CheckResult {
        let request = ProbeRequest::new(&service.target, &service.headers).at(now);
        self.tls_probe.probe(&request).await
    }
}
