//! Turning consecutive check outcomes into notification triggers.

use chrono::{DateTime, Duration, Utc};

use super::types::{CertificateInfo, CheckResult, ServiceStatus};
use crate::notification::events::{NotificationEvent, Trigger};

/// Event for a status change.
///
/// `None` for the first check after startup and for repeats. Offline and timeout are
/// the same failure as far as alerting goes, so moving between them is not a transition.
pub fn classify_transition(previous: Option<ServiceStatus>, current: ServiceStatus) -> Option<NotificationEvent> {
    let previous = previous?;
    if previous == current || (previous.is_failing() && current.is_failing()) {
        return None;
    }

    match current {
        ServiceStatus::Offline | ServiceStatus::Timeout => Some(NotificationEvent::Down),
        ServiceStatus::Online if previous.is_failing() => Some(NotificationEvent::Up),
        ServiceStatus::Degraded => Some(NotificationEvent::Degraded),
        ServiceStatus::Online | ServiceStatus::Unknown => None,
    }
}

/// Thresholds for certificate alerts
#[derive(Debug, Clone, Copy)]
pub struct SslAlertPolicy {
    pub warning_days: i64,
    pub warning_interval: Duration,
}

impl Default for SslAlertPolicy {
    fn default() -> Self {
        Self { warning_days: 14, warning_interval: Duration::hours(24) }
    }
}

/// What earlier ticks saw of a service's certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateHistory {
    /// `days_remaining` recorded by the previous check, if any
    pub previous_days: Option<i64>,
    pub last_warning_at: Option<DateTime<Utc>>,
}

impl SslAlertPolicy {
    /// `ssl_expiry` when the certificate reaches or passes its end date, `ssl_warning` inside
    /// the warning band unless one was already raised within `warning_interval`.
    ///
    /// Expiry is raised once, on the check that first sees the certificate expired.
    pub fn classify(
        &self,
        certificate: &CertificateInfo,
        history: CertificateHistory,
        now: DateTime<Utc>,
    ) -> Option<NotificationEvent> {
        let days = certificate.days_until_expiry;
        if days <= 0 {
            let already_expired = history.previous_days.is_some_and(|previous| previous <= 0);
            return (!already_expired).then_some(NotificationEvent::SslExpiry);
        }
        if days > self.warning_days {
            return None;
        }
        match history.last_warning_at {
            Some(last) if now - last < self.warning_interval => None,
            _ => Some(NotificationEvent::SslWarning),
        }
    }
}

/// Everything the dispatcher should be asked about for one check.
///
/// `certificate_event` comes from [`SslAlertPolicy::classify`] and is passed in so the
/// caller can keep the warning rate limit.
pub fn collect_triggers(
    previous: Option<ServiceStatus>,
    result: &CheckResult,
    certificate_event: Option<NotificationEvent>,
) -> Vec<Trigger> {
    let mut triggers = Vec::new();

    match classify_transition(previous, result.status) {
        Some(NotificationEvent::Degraded) => {
            triggers.push(Trigger::new(NotificationEvent::Degraded));
            if result.content_match == Some(false) {
                triggers.push(Trigger::new(NotificationEvent::ContentMismatch));
            }
        }
        Some(event) => triggers.push(Trigger::new(event)),
        None if previous.is_some_and(ServiceStatus::is_failing) && result.status.is_failing() => {
            triggers.push(Trigger::sustained_outage());
        }
        None => {}
    }

    if let Some(event) = certificate_event {
        triggers.push(Trigger::new(event));
    }

    triggers
}
