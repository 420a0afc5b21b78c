use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Status of a service or of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Never checked. A probe never produces this.
    #[default]
    Unknown,
    Online,
    Degraded,
    Offline,
    Timeout,
}

impl ServiceStatus {
    /// Online and degraded both count as available time.
    pub fn is_available(self) -> bool {
        matches!(self, Self::Online | Self::Degraded)
    }

    pub fn is_failing(self) -> bool {
        matches!(self, Self::Offline | Self::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Degraded => "degraded",
            Self::Offline => "offline",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unknown" => Ok(Self::Unknown),
            "online" => Ok(Self::Online),
            "degraded" => Ok(Self::Degraded),
            "offline" => Ok(Self::Offline),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown service status '{other}'")),
        }
    }
}

/// Protocol used to check a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Http,
    Https,
    Ping,
    Dns,
    Tcp,
    Ssl,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ping => "ping",
            Self::Dns => "dns",
            Self::Tcp => "tcp",
            Self::Ssl => "ssl",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "ping" | "icmp" => Ok(Self::Ping),
            "dns" => Ok(Self::Dns),
            "tcp" => Ok(Self::Tcp),
            "ssl" | "tls" => Ok(Self::Ssl),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// Fields read from a peer certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub days_until_expiry: i64,
}

/// Protocol-specific payload attached to a check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProbeData {
    #[serde(rename_all = "camelCase")]
    Http { status_code: u16 },
    Dns { addresses: Vec<String> },
    Certificate(CertificateInfo),
}

/// Normalized outcome of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub status: ServiceStatus,
    pub response_time_ms: u64,
    pub message: String,

    /// Only set when a content pattern was configured and evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_match: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProbeData>,
}

impl CheckResult {
    pub fn online(response_time_ms: u64, message: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Online, response_time_ms, message)
    }

    pub fn degraded(response_time_ms: u64, message: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Degraded, response_time_ms, message)
    }

    pub fn offline(response_time_ms: u64, message: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Offline, response_time_ms, message)
    }

    pub fn timeout(response_time_ms: u64, message: impl Into<String>) -> Self {
        Self::with_status(ServiceStatus::Timeout, response_time_ms, message)
    }

    fn with_status(status: ServiceStatus, response_time_ms: u64, message: impl Into<String>) -> Self {
        Self { status, response_time_ms, message: message.into(), content_match: None, data: None }
    }

    pub fn with_content_match(mut self, matched: bool) -> Self {
        self.content_match = Some(matched);
        self
    }

    pub fn with_data(mut self, data: ProbeData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn certificate(&self) -> Option<&CertificateInfo> {
        match &self.data {
            Some(ProbeData::Certificate(info)) => Some(info),
            _ => None,
        }
    }
}
