use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::events::NotificationEvent;
use crate::database::models::Service;
use crate::monitoring::types::{CheckResult, ServiceStatus, ServiceType};

/// Service fields included with every notification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub target: String,
    pub status: ServiceStatus,
    pub uptime_percent: f64,
}

/// Everything a channel is told about one event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub event: NotificationEvent,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub service: ServiceSnapshot,
    pub result: CheckResult,
}

impl NotificationMessage {
    pub fn new(event: NotificationEvent, service: &Service, result: &CheckResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            event,
            timestamp,
            message: describe(event, service, result),
            service: ServiceSnapshot {
                id: service.id,
                name: service.name.clone(),
                service_type: service.service_type,
                target: service.target.clone(),
                status: result.status,
                uptime_percent: service.uptime_percent,
            },
            result: result.clone(),
        }
    }

    /// JSON body sent when a channel has no template
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Substitute `{{placeholder}}` tokens in a channel body template
    pub fn render(&self, template: &str) -> String {
        let timestamp = self.timestamp.to_rfc3339();
        [
            ("{{event}}", self.event.as_str()),
            ("{{message}}", self.message.as_str()),
            ("{{status}}", self.service.status.as_str()),
            ("{{timestamp}}", timestamp.as_str()),
            ("{{service.name}}", self.service.name.as_str()),
            ("{{service.target}}", self.service.target.as_str()),
        ]
        .iter()
        .fold(template.to_string(), |body, (token, value)| body.replace(token, value))
    }
}

fn describe(event: NotificationEvent, service: &Service, result: &CheckResult) -> String {
    let name = &service.name;
    match event {
        NotificationEvent::Down => format!("{name} is down: {}", result.message),
        NotificationEvent::Up => format!("{name} is back up ({} ms)", result.response_time_ms),
        NotificationEvent::Degraded => format!("{name} is degraded: {}", result.message),
        NotificationEvent::ContentMismatch => format!("{name} responded without the expected content"),
        NotificationEvent::SslExpiry | NotificationEvent::SslWarning => match result.certificate() {
            Some(cert) if cert.days_until_expiry < 0 => {
                format!("{name} certificate expired {} days ago", -cert.days_until_expiry)
            }
            Some(cert) if cert.days_until_expiry == 0 => format!("{name} certificate expires today"),
            Some(cert) => format!("{name} certificate expires in {} days", cert.days_until_expiry),
            None => format!("{name} certificate needs attention: {}", result.message),
        },
    }
}
