use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::monitoring::types::{CertificateInfo, CheckResult, ProbeData, ServiceStatus, ServiceType};
use crate::monitoring::uptime::UptimeState;
use crate::notification::events::{EventSet, NotificationEvent};

pub const MIN_CHECK_INTERVAL_SECONDS: u64 = 10;
pub const MAX_CHECK_INTERVAL_SECONDS: u64 = 3600;

/// Convert a timestamp to Unix milliseconds for storage
pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Parse a JSON text column into a typed value.
///
/// Malformed input is logged and treated as absent.
pub fn parse_stored_json<T: DeserializeOwned>(raw: Option<&str>, column: &str, owner: Uuid) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    serde_json::from_str(raw)
        .inspect_err(|error| {
            tracing::warn!(%owner, column, %error, "Ignoring malformed stored configuration");
        })
        .ok()
}

/// Certificate facts remembered on the service row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslMetadata {
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
    pub issuer: String,
    pub subject: String,
}

impl From<&CertificateInfo> for SslMetadata {
    fn from(info: &CertificateInfo) -> Self {
        Self {
            expires_at: info.valid_to,
            days_remaining: info.days_until_expiry,
            issuer: info.issuer.clone(),
            subject: info.subject.clone(),
        }
    }
}

/// Service model - a monitored target and its accumulated state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub target: String,
    pub check_interval_seconds: u64,
    pub is_active: bool,
    pub status: ServiceStatus,
    pub response_time_ms: Option<u64>,
    pub total_monitored_time_ms: i64,
    pub online_time_ms: i64,
    pub uptime_percent: f64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub content_match_pattern: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub ssl: Option<SslMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// Create a new, never-checked service
    pub fn new(name: impl Into<String>, service_type: ServiceType, target: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            service_type,
            target: target.into(),
            check_interval_seconds: 60,
            is_active: true,
            status: ServiceStatus::Unknown,
            response_time_ms: None,
            total_monitored_time_ms: 0,
            online_time_ms: 0,
            uptime_percent: 100.0,
            last_checked_at: None,
            content_match_pattern: None,
            headers: BTreeMap::new(),
            ssl: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.check_interval_seconds = seconds;
        self
    }

    pub fn with_content_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.content_match_pattern = Some(pattern.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check interval, clamped to the supported range
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(
            self.check_interval_seconds.clamp(MIN_CHECK_INTERVAL_SECONDS, MAX_CHECK_INTERVAL_SECONDS),
        )
    }

    pub fn uptime_state(&self) -> UptimeState {
        UptimeState {
            total_monitored_time_ms: self.total_monitored_time_ms,
            online_time_ms: self.online_time_ms,
            uptime_percent: self.uptime_percent,
            last_checked_at: self.last_checked_at,
        }
    }
}

/// Partial update written after each check
#[derive(Debug, Clone)]
pub struct ServiceStateUpdate {
    pub status: ServiceStatus,
    pub response_time_ms: u64,
    pub uptime: UptimeState,
    /// `None` leaves the stored certificate metadata untouched
    pub ssl: Option<SslMetadata>,
}

/// Append-only record of one check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLogEntry {
    pub id: Option<i64>,
    pub service_id: Uuid,
    pub status: ServiceStatus,
    pub response_time_ms: u64,
    pub message: String,
    pub content_match: Option<bool>,
    pub data: Option<ProbeData>,
    pub checked_at: DateTime<Utc>,
}

impl ServiceLogEntry {
    pub fn from_check_result(service_id: Uuid, result: &CheckResult, checked_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            service_id,
            status: result.status,
            response_time_ms: result.response_time_ms,
            message: result.message.clone(),
            content_match: result.content_match,
            data: result.data.clone(),
            checked_at,
        }
    }
}

/// Time-series point used by response time and uptime charts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub id: Option<i64>,
    pub service_id: Uuid,
    pub response_time_ms: u64,
    pub status: ServiceStatus,
    pub uptime_percent: f64,
    pub recorded_at: DateTime<Utc>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Outbound webhook description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body_template: Option<String>,
}

impl WebhookConfig {
    pub fn post(url: impl Into<String>) -> Self {
        Self { url: url.into(), method: default_method(), headers: BTreeMap::new(), body_template: None }
    }
}

/// Delivery configuration stored with a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Webhook(WebhookConfig),
}

#[derive(Debug, Clone)]
pub struct NotificationChannel {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    /// `None` when the stored configuration could not be parsed
    pub config: Option<ChannelConfig>,
    pub created_at: DateTime<Utc>,
}

impl NotificationChannel {
    pub fn webhook(name: impl Into<String>, config: WebhookConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            config: Some(ChannelConfig::Webhook(config)),
            created_at: Utc::now(),
        }
    }
}

/// Binds a service to a channel for a set of events
#[derive(Debug, Clone)]
pub struct NotificationRule {
    pub id: Uuid,
    pub service_id: Uuid,
    pub channel_id: Uuid,
    pub events: EventSet,
    /// Consecutive failing checks required before `down` fires
    pub threshold: u32,
    pub cooldown_seconds: u64,
    pub consecutive_failures: u32,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRule {
    pub fn new(service_id: Uuid, channel_id: Uuid, events: impl IntoIterator<Item = NotificationEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            channel_id,
            events: events.into_iter().collect(),
            threshold: 1,
            cooldown_seconds: 0,
            consecutive_failures: 0,
            last_notified_at: None,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    pub fn subscribes_to(&self, event: NotificationEvent) -> bool {
        self.events.contains(&event)
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_notified_at else {
            return false;
        };
        let cooldown_ms = i64::try_from(self.cooldown_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        (now - last).num_milliseconds() < cooldown_ms
    }
}

/// Partial update written by the dispatcher after a send attempt
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub last_notified_at: Option<DateTime<Utc>>,
    pub consecutive_failures: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Immutable record of one delivery attempt
#[derive(Debug, Clone)]
pub struct NotificationHistoryEntry {
    pub id: Option<i64>,
    pub rule_id: Uuid,
    pub channel_id: Uuid,
    pub service_id: Uuid,
    pub event: NotificationEvent,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Declared period during which alerts for a service are suppressed
#[derive(Debug, Clone)]
pub struct MaintenanceWindow {
    pub id: Uuid,
    pub service_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl MaintenanceWindow {
    pub fn new(service_id: Uuid, title: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(), service_id, title: title.into(), start_time, end_time, is_active: true }
    }

    /// Both ends are inclusive
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_time <= now && now <= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn check_interval_is_clamped() {
        let service = Service::new("api", ServiceType::Http, "https://example.com");
        assert_eq!(service.clone().with_interval(1).check_interval(), Duration::from_secs(10));
        assert_eq!(service.clone().with_interval(86_400).check_interval(), Duration::from_secs(3600));
        assert_eq!(service.with_interval(90).check_interval(), Duration::from_secs(90));
    }

    #[test]
    fn cooldown_uses_last_notification_time() {
        let now = Utc::now();
        let mut rule = NotificationRule::new(Uuid::new_v4(), Uuid::new_v4(), [NotificationEvent::Down])
            .with_cooldown(300);
        assert!(!rule.in_cooldown(now));

        rule.last_notified_at = Some(now - ChronoDuration::seconds(299));
        assert!(rule.in_cooldown(now));

        rule.last_notified_at = Some(now - ChronoDuration::seconds(300));
        assert!(!rule.in_cooldown(now));
    }

    #[test]
    fn maintenance_window_bounds_are_inclusive() {
        let start = Utc::now();
        let end = start + ChronoDuration::hours(1);
        let mut window = MaintenanceWindow::new(Uuid::new_v4(), "upgrade", start, end);

        assert!(window.covers(start));
        assert!(window.covers(end));
        assert!(!window.covers(end + ChronoDuration::milliseconds(1)));

        window.is_active = false;
        assert!(!window.covers(start));
    }

    #[test]
    fn malformed_json_is_treated_as_absent() {
        let owner = Uuid::new_v4();
        let parsed: Option<BTreeMap<String, String>> = parse_stored_json(Some("{not json"), "headers", owner);
        assert!(parsed.is_none());

        let parsed: Option<BTreeMap<String, String>> =
            parse_stored_json(Some(r#"{"X-Token":"abc"}"#), "headers", owner);
        assert_eq!(parsed.unwrap().get("X-Token").map(String::as_str), Some("abc"));
    }

    #[test]
    fn webhook_method_defaults_to_post() {
        let config: ChannelConfig =
            serde_json::from_str(r#"{"kind":"webhook","url":"https://hooks.example.com/x"}"#).unwrap();
        let ChannelConfig::Webhook(webhook) = config;
        assert_eq!(webhook.method, "POST");
        assert!(webhook.headers.is_empty());
    }
}
