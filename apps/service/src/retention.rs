//! Automatic retention and cleanup of check history.
//!
//! Check logs and performance metrics default to 30 days, notification
//! history to 90. Cleanup runs periodically as a background task.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetentionSettings;
use crate::database::Database;

/// Retention policy for the append-only tables
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep service check logs
    pub log_days: i64,
    /// Days to keep performance metrics
    pub metric_days: i64,
    /// Days to keep notification history
    pub history_days: i64,
    pub cleanup_interval: std::time::Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionSettings::default())
    }
}

impl From<&RetentionSettings> for RetentionPolicy {
    fn from(settings: &RetentionSettings) -> Self {
        Self {
            log_days: settings.log_days,
            metric_days: settings.metric_days,
            history_days: settings.history_days,
            cleanup_interval: std::time::Duration::from_secs(settings.cleanup_interval_minutes.max(1) * 60),
        }
    }
}

/// Rows deleted by one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub logs: u64,
    pub metrics: u64,
    pub history: u64,
}

fn cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days.max(0))
}

/// Cleanup manager for expired rows
pub struct RetentionCleanup {
    database: Arc<dyn Database>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    /// Create a new retention cleanup manager
    pub fn new(database: Arc<dyn Database>, policy: RetentionPolicy) -> Self {
        Self { database, policy }
    }

    /// Delete everything older than the policy allows, relative to `now`
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        debug!(
            log_days = self.policy.log_days,
            metric_days = self.policy.metric_days,
            history_days = self.policy.history_days,
            "Starting retention cleanup"
        );

        let report = CleanupReport {
            logs: self.database.delete_logs_before(cutoff(now, self.policy.log_days)).await?,
            metrics: self.database.delete_metrics_before(cutoff(now, self.policy.metric_days)).await?,
            history: self.database.delete_history_before(cutoff(now, self.policy.history_days)).await?,
        };

        info!(
            "Retention cleanup completed: {} logs, {} metrics, {} history entries deleted",
            report.logs, report.metrics, report.history
        );
        Ok(report)
    }

    /// Start background cleanup task, running until `shutdown` is cancelled
    pub fn start_periodic_cleanup(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.cleanup_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if let Err(e) = self.cleanup_expired(Utc::now()).await {
                    warn!("Periodic retention cleanup failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_policy_defaults() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.log_days, 30);
        assert_eq!(policy.metric_days, 30);
        assert_eq!(policy.history_days, 90);
        assert_eq!(policy.cleanup_interval, std::time::Duration::from_secs(3600));
    }

    #[test]
    fn test_cutoff_calculation() {
        let now = Utc::now();
        assert_eq!(cutoff(now, 30), now - Duration::days(30));
        assert_eq!(cutoff(now, -4), now);
    }

    #[test]
    fn test_custom_retention_policy() {
        let settings = RetentionSettings { log_days: 7, cleanup_interval_minutes: 0, ..Default::default() };
        let policy = RetentionPolicy::from(&settings);
        assert_eq!(policy.log_days, 7);
        assert_eq!(policy.history_days, 90);
        assert_eq!(policy.cleanup_interval, std::time::Duration::from_secs(60));
    }
}
