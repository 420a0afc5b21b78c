//! Rule matching, gating, delivery and bookkeeping for one notification trigger.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::delivery::Deliver;
use super::events::{NotificationEvent, Trigger};
use super::message::NotificationMessage;
use crate::database::Database;
use crate::database::models::{
    DeliveryStatus, NotificationChannel, NotificationHistoryEntry, NotificationRule, RuleUpdate, Service,
};
use crate::monitoring::types::CheckResult;

/// Outcome of the gate for a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Pass,
    Cooldown,
    BelowThreshold,
}

/// Cooldown first, then the failure threshold for `down`.
///
/// A sustained trigger only passes on the exact threshold crossing, so a rule fires
/// once per outage instead of on every failing check after it.
pub fn gate(rule: &NotificationRule, trigger: Trigger, now: DateTime<Utc>) -> Gate {
    if rule.in_cooldown(now) {
        return Gate::Cooldown;
    }
    if trigger.event != NotificationEvent::Down {
        return Gate::Pass;
    }

    let reached = if trigger.sustained {
        rule.consecutive_failures == rule.threshold
    } else {
        rule.consecutive_failures >= rule.threshold
    };
    if reached { Gate::Pass } else { Gate::BelowThreshold }
}

/// Counts for one dispatch, mostly useful in logs and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub matched: usize,
    pub skipped: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Notification dispatcher
pub struct NotificationDispatcher {
    database: Arc<dyn Database>,
    sender: Arc<dyn Deliver>,
}

impl NotificationDispatcher {
    pub fn new(database: Arc<dyn Database>, sender: Arc<dyn Deliver>) -> Self {
        Self { database, sender }
    }

    /// Evaluate every enabled rule of `service` against `trigger`.
    ///
    /// Never fails: storage and delivery problems are logged or written to history.
    pub async fn dispatch(
        &self,
        service: &Service,
        trigger: Trigger,
        result: &CheckResult,
        now: DateTime<Utc>,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        let rules = match self.database.find_enabled_rules_for_service(service.id).await {
            Ok(rules) => rules,
            Err(error) => {
                warn!(service_id = %service.id, %error, "Failed to load notification rules");
                return summary;
            }
        };

        let mut due = Vec::new();
        for (rule, channel) in rules.into_iter().filter(|(rule, _)| rule.subscribes_to(trigger.event)) {
            summary.matched += 1;
            match gate(&rule, trigger, now) {
                Gate::Pass => due.push((rule, channel)),
                skipped => {
                    summary.skipped += 1;
                    debug!(
                        rule_id = %rule.id,
                        event = %trigger.event,
                        gate = ?skipped,
                        consecutive_failures = rule.consecutive_failures,
                        "Notification held back"
                    );
                }
            }
        }

        if due.is_empty() {
            return summary;
        }

        let message = NotificationMessage::new(trigger.event, service, result, now);
        let outcomes = join_all(due.iter().map(|(rule, channel)| self.notify(rule, channel, &message))).await;

        for status in outcomes {
            match status {
                DeliveryStatus::Sent => summary.sent += 1,
                DeliveryStatus::Failed => summary.failed += 1,
            }
        }

        info!(
            service_id = %service.id,
            event = %trigger.event,
            sent = summary.sent,
            failed = summary.failed,
            "Dispatched notifications"
        );
        summary
    }

    async fn notify(
        &self,
        rule: &NotificationRule,
        channel: &NotificationChannel,
        message: &NotificationMessage,
    ) -> DeliveryStatus {
        let outcome = match &channel.config {
            Some(config) => self.sender.deliver(config, message).await.map_err(|e| e.to_string()),
            None => Err("channel configuration is missing or invalid".to_string()),
        };

        let (status, error, status_code) = match outcome {
            Ok(receipt) => (DeliveryStatus::Sent, None, Some(receipt.status_code)),
            Err(error) => {
                warn!(rule_id = %rule.id, channel_id = %channel.id, %error, "Notification delivery failed");
                (DeliveryStatus::Failed, Some(error), None)
            }
        };

        let entry = NotificationHistoryEntry {
            id: None,
            rule_id: rule.id,
            channel_id: channel.id,
            service_id: rule.service_id,
            event: message.event,
            status,
            error,
            metadata: json!({
                "event": message.event,
                "message": message.message,
                "statusCode": status_code,
            }),
            created_at: message.timestamp,
        };
        if let Err(error) = self.database.append_notification_history(&entry).await {
            warn!(rule_id = %rule.id, %error, "Failed to record notification history");
        }

        let update = RuleUpdate {
            last_notified_at: Some(message.timestamp),
            consecutive_failures: (message.event == NotificationEvent::Up).then_some(0),
        };
        if let Err(error) = self.database.update_rule(rule.id, &update).await {
            warn!(rule_id = %rule.id, %error, "Failed to update notification rule");
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn rule(threshold: u32, failures: u32) -> NotificationRule {
        let mut rule = NotificationRule::new(Uuid::new_v4(), Uuid::new_v4(), [NotificationEvent::Down])
            .with_threshold(threshold)
            .with_cooldown(600);
        rule.consecutive_failures = failures;
        rule
    }

    #[test]
    fn threshold_applies_to_down_only() {
        let now = Utc::now();
        let down = Trigger::new(NotificationEvent::Down);

        assert_eq!(gate(&rule(3, 1), down, now), Gate::BelowThreshold);
        assert_eq!(gate(&rule(3, 3), down, now), Gate::Pass);
        assert_eq!(gate(&rule(3, 0), Trigger::new(NotificationEvent::Degraded), now), Gate::Pass);
    }

    #[test]
    fn sustained_outage_fires_on_exact_threshold() {
        let now = Utc::now();
        let sustained = Trigger::sustained_outage();

        assert_eq!(gate(&rule(3, 2), sustained, now), Gate::BelowThreshold);
        assert_eq!(gate(&rule(3, 3), sustained, now), Gate::Pass);
        assert_eq!(gate(&rule(3, 4), sustained, now), Gate::BelowThreshold);
        assert_eq!(gate(&rule(1, 2), sustained, now), Gate::BelowThreshold);
    }

    #[test]
    fn cooldown_is_checked_before_threshold() {
        let now = Utc::now();
        let mut recent = rule(1, 5);
        recent.last_notified_at = Some(now - Duration::seconds(30));
        assert_eq!(gate(&recent, Trigger::new(NotificationEvent::Down), now), Gate::Cooldown);

        recent.last_notified_at = Some(now - Duration::seconds(600));
        assert_eq!(gate(&recent, Trigger::new(NotificationEvent::Down), now), Gate::Pass);
    }
}
