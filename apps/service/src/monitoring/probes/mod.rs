//! Protocol checkers.
//!
//! Every probe turns its own failures into a [`CheckResult`]; none of them retry.

pub mod dns;
pub mod http;
pub mod ping;
pub mod target;
pub mod tcp;
pub mod tls;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Instant;

use super::types::CheckResult;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use tcp::TcpProbe;
pub use tls::TlsProbe;

/// What a probe needs to know about the service it checks
#[derive(Debug, Clone, Copy)]
pub struct ProbeRequest<'a> {
    pub target: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub content_pattern: Option<&'a str>,
    /// Wall-clock time the check is recorded at
    pub checked_at: DateTime<Utc>,
}

impl<'a> ProbeRequest<'a> {
    pub fn new(target: &'a str, headers: &'a BTreeMap<String, String>) -> Self {
        Self { target, headers, content_pattern: None, checked_at: Utc::now() }
    }

    pub fn at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    pub fn with_content_pattern(mut self, pattern: Option<&'a str>) -> Self {
        self.content_pattern = pattern.filter(|p| !p.is_empty());
        self
    }
}

#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult;
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
