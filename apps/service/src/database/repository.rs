use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::error::{DatabaseError, Result};
use super::models::{
    ChannelConfig, DeliveryStatus, MaintenanceWindow, NotificationChannel, NotificationHistoryEntry,
    NotificationRule, PerformanceMetric, RuleUpdate, Service, ServiceLogEntry, ServiceStateUpdate, SslMetadata,
    from_millis, parse_stored_json, to_millis,
};
use crate::monitoring::types::ProbeData;
use crate::notification::events::{EventSet, NotificationEvent};
use crate::pool::LibsqlPool;
use crate::validation::validate_service;

/// Storage operations the monitoring core and the definition layer rely on
#[async_trait]
pub trait Database: Send + Sync {
    /// Get a service by id
    async fn load_service(&self, id: Uuid) -> Result<Option<Service>>;

    /// Get all services that should be scheduled
    async fn list_active_services(&self) -> Result<Vec<Service>>;

    /// Write the status and metric fields produced by a check
    async fn update_service_state(&self, id: Uuid, update: &ServiceStateUpdate) -> Result<()>;

    async fn append_service_log(&self, entry: &ServiceLogEntry) -> Result<i64>;

    async fn append_performance_metric(&self, metric: &PerformanceMetric) -> Result<i64>;

    /// Active windows of a service containing `now`
    async fn find_active_maintenance_windows(&self, service_id: Uuid, now: DateTime<Utc>)
    -> Result<Vec<MaintenanceWindow>>;

    /// Enabled rules of a service, each with its enabled channel
    async fn find_enabled_rules_for_service(&self, service_id: Uuid)
    -> Result<Vec<(NotificationRule, NotificationChannel)>>;

    async fn update_rule(&self, id: Uuid, update: &RuleUpdate) -> Result<()>;

    /// Count one more failing check on every enabled rule of a service
    async fn increment_rule_failures(&self, service_id: Uuid) -> Result<()>;

    /// Clear the failure streak on every rule of a service
    async fn reset_rule_failures(&self, service_id: Uuid) -> Result<()>;

    async fn append_notification_history(&self, entry: &NotificationHistoryEntry) -> Result<i64>;

    /// Insert a service or update its definition fields
    async fn save_service(&self, service: &Service) -> Result<()>;

    /// Hard delete a service with its logs, metrics, rules, history and windows
    async fn delete_service(&self, id: Uuid) -> Result<bool>;

    async fn save_channel(&self, channel: &NotificationChannel) -> Result<()>;

    async fn save_rule(&self, rule: &NotificationRule) -> Result<()>;

    async fn get_rule(&self, id: Uuid) -> Result<Option<NotificationRule>>;

    async fn save_maintenance_window(&self, window: &MaintenanceWindow) -> Result<()>;

    /// Newest first
    async fn recent_service_logs(&self, service_id: Uuid, limit: usize) -> Result<Vec<ServiceLogEntry>>;

    /// Newest first
    async fn recent_performance_metrics(&self, service_id: Uuid, limit: usize) -> Result<Vec<PerformanceMetric>>;

    /// Newest first
    async fn notification_history(&self, service_id: Uuid, limit: usize) -> Result<Vec<NotificationHistoryEntry>>;

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn delete_metrics_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn delete_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

const SERVICE_COLUMNS: &str = "id, name, service_type, target, check_interval_seconds, is_active, status, \
    response_time_ms, total_monitored_time_ms, online_time_ms, uptime_percent, last_checked_at, \
    content_match_pattern, headers, ssl_expires_at, ssl_days_remaining, ssl_issuer, ssl_subject, \
    created_at, updated_at";

const RULE_COLUMNS: &str = "r.id, r.service_id, r.channel_id, r.events, r.threshold, r.cooldown_seconds, \
    r.consecutive_failures, r.last_notified_at, r.enabled, r.created_at";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn parse_uuid(raw: &str, table: &'static str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::corrupt(table, format!("bad id '{raw}': {e}")))
}

fn row_to_service(row: &Row) -> Result<Service> {
    let id = parse_uuid(&row.get::<String>(0)?, "services")?;
    let service_type = row.get::<String>(2)?.parse().map_err(|e| DatabaseError::corrupt("services", e))?;
    let status = row.get::<String>(6)?.parse().map_err(|e| DatabaseError::corrupt("services", e))?;
    let headers: BTreeMap<String, String> =
        parse_stored_json(row.get::<Option<String>>(13)?.as_deref(), "headers", id).unwrap_or_default();

    let ssl = row.get::<Option<i64>>(14)?.map(|expires_at| -> Result<SslMetadata> {
        Ok(SslMetadata {
            expires_at: from_millis(expires_at),
            days_remaining: row.get::<Option<i64>>(15)?.unwrap_or_default(),
            issuer: row.get::<Option<String>>(16)?.unwrap_or_default(),
            subject: row.get::<Option<String>>(17)?.unwrap_or_default(),
        })
    });

    Ok(Service {
        id,
        name: row.get(1)?,
        service_type,
        target: row.get(3)?,
        check_interval_seconds: row.get::<i64>(4)?.max(0) as u64,
        is_active: row.get::<i64>(5)? != 0,
        status,
        response_time_ms: row.get::<Option<i64>>(7)?.map(|v| v.max(0) as u64),
        total_monitored_time_ms: row.get(8)?,
        online_time_ms: row.get(9)?,
        uptime_percent: row.get(10)?,
        last_checked_at: row.get::<Option<i64>>(11)?.map(from_millis),
        content_match_pattern: row.get(12)?,
        headers,
        ssl: ssl.transpose()?,
        created_at: from_millis(row.get(18)?),
        updated_at: from_millis(row.get(19)?),
    })
}

fn parse_events(raw: &str, rule_id: Uuid) -> EventSet {
    let names: Vec<String> = parse_stored_json(Some(raw), "events", rule_id).unwrap_or_default();
    names
        .iter()
        .filter_map(|name| {
            name.parse::<NotificationEvent>()
                .inspect_err(|error| tracing::warn!(%rule_id, %error, "Ignoring unknown rule event"))
                .ok()
        })
        .collect()
}

/// Expects `RULE_COLUMNS` at the start of the row
fn row_to_rule(row: &Row) -> Result<NotificationRule> {
    let id = parse_uuid(&row.get::<String>(0)?, "notification_rules")?;
    Ok(NotificationRule {
        id,
        service_id: parse_uuid(&row.get::<String>(1)?, "notification_rules")?,
        channel_id: parse_uuid(&row.get::<String>(2)?, "notification_rules")?,
        events: parse_events(&row.get::<String>(3)?, id),
        threshold: row.get::<i64>(4)?.clamp(0, u32::MAX as i64) as u32,
        cooldown_seconds: row.get::<i64>(5)?.max(0) as u64,
        consecutive_failures: row.get::<i64>(6)?.clamp(0, u32::MAX as i64) as u32,
        last_notified_at: row.get::<Option<i64>>(7)?.map(from_millis),
        enabled: row.get::<i64>(8)? != 0,
        created_at: from_millis(row.get(9)?),
    })
}

/// Channel columns starting at `offset`
fn row_to_channel(row: &Row, offset: i32) -> Result<NotificationChannel> {
    let id = parse_uuid(&row.get::<String>(offset)?, "notification_channels")?;
    let config: Option<ChannelConfig> =
        parse_stored_json(row.get::<Option<String>>(offset + 3)?.as_deref(), "config", id);
    Ok(NotificationChannel {
        id,
        name: row.get(offset + 1)?,
        enabled: row.get::<i64>(offset + 2)? != 0,
        config,
        created_at: from_millis(row.get(offset + 4)?),
    })
}

fn to_json(value: &impl serde::Serialize, table: &'static str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DatabaseError::corrupt(table, e))
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn load_service(&self, id: Uuid) -> Result<Option<Service>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?"), params![id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_service(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_active_services(&self) -> Result<Vec<Service>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {SERVICE_COLUMNS} FROM services WHERE is_active = 1 ORDER BY created_at"), ())
            .await?;

        let mut services = Vec::new();
        while let Some(row) = rows.next().await? {
            // One corrupt row should not hide every other service from the scheduler.
            match row_to_service(&row) {
                Ok(service) => services.push(service),
                Err(error) => tracing::warn!(%error, "Skipping unreadable service row"),
            }
        }

        Ok(services)
    }

    async fn update_service_state(&self, id: Uuid, update: &ServiceStateUpdate) -> Result<()> {
        let conn = self.get_conn().await?;
        let now = to_millis(Utc::now());
        let uptime = &update.uptime;

        let changed = match &update.ssl {
            Some(ssl) => {
                conn.execute(
                    "UPDATE services SET status = ?, response_time_ms = ?, total_monitored_time_ms = ?, \
                     online_time_ms = ?, uptime_percent = ?, last_checked_at = ?, ssl_expires_at = ?, \
                     ssl_days_remaining = ?, ssl_issuer = ?, ssl_subject = ?, updated_at = ? WHERE id = ?",
                    params![
                        update.status.to_string(),
                        update.response_time_ms as i64,
                        uptime.total_monitored_time_ms,
                        uptime.online_time_ms,
                        uptime.uptime_percent,
                        uptime.last_checked_at.map(to_millis),
                        to_millis(ssl.expires_at),
                        ssl.days_remaining,
                        ssl.issuer.clone(),
                        ssl.subject.clone(),
                        now,
                        id.to_string()
                    ],
                )
                .await?
            }
            None => {
                conn.execute(
                    "UPDATE services SET status = ?, response_time_ms = ?, total_monitored_time_ms = ?, \
                     online_time_ms = ?, uptime_percent = ?, last_checked_at = ?, updated_at = ? WHERE id = ?",
                    params![
                        update.status.to_string(),
                        update.response_time_ms as i64,
                        uptime.total_monitored_time_ms,
                        uptime.online_time_ms,
                        uptime.uptime_percent,
                        uptime.last_checked_at.map(to_millis),
                        now,
                        id.to_string()
                    ],
                )
                .await?
            }
        };

        if changed == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    async fn append_service_log(&self, entry: &ServiceLogEntry) -> Result<i64> {
        let conn = self.get_conn().await?;
        let data = entry.data.as_ref().map(|data| to_json(data, "service_logs")).transpose()?;

        conn.execute(
            "INSERT INTO service_logs (service_id, status, response_time_ms, message, content_match, data, checked_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.service_id.to_string(),
                entry.status.to_string(),
                entry.response_time_ms as i64,
                entry.message.clone(),
                entry.content_match.map(i64::from),
                data,
                to_millis(entry.checked_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn append_performance_metric(&self, metric: &PerformanceMetric) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO performance_metrics (service_id, response_time_ms, status, uptime_percent, recorded_at) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                metric.service_id.to_string(),
                metric.response_time_ms as i64,
                metric.status.to_string(),
                metric.uptime_percent,
                to_millis(metric.recorded_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn find_active_maintenance_windows(
        &self,
        service_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceWindow>> {
        let conn = self.get_conn().await?;
        let now = to_millis(now);
        let mut rows = conn
            .query(
                "SELECT id, service_id, title, start_time, end_time, is_active FROM maintenance_windows \
                 WHERE service_id = ? AND is_active = 1 AND start_time <= ? AND end_time >= ?",
                params![service_id.to_string(), now, now],
            )
            .await?;

        let mut windows = Vec::new();
        while let Some(row) = rows.next().await? {
            windows.push(MaintenanceWindow {
                id: parse_uuid(&row.get::<String>(0)?, "maintenance_windows")?,
                service_id: parse_uuid(&row.get::<String>(1)?, "maintenance_windows")?,
                title: row.get(2)?,
                start_time: from_millis(row.get(3)?),
                end_time: from_millis(row.get(4)?),
                is_active: row.get::<i64>(5)? != 0,
            });
        }

        Ok(windows)
    }

    async fn find_enabled_rules_for_service(
        &self,
        service_id: Uuid,
    ) -> Result<Vec<(NotificationRule, NotificationChannel)>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS}, c.id, c.name, c.enabled, c.config, c.created_at \
                     FROM notification_rules r JOIN notification_channels c ON c.id = r.channel_id \
                     WHERE r.service_id = ? AND r.enabled = 1 AND c.enabled = 1 ORDER BY r.created_at"
                ),
                params![service_id.to_string()],
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push((row_to_rule(&row)?, row_to_channel(&row, 10)?));
        }

        Ok(rules)
    }

    async fn update_rule(&self, id: Uuid, update: &RuleUpdate) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "UPDATE notification_rules SET last_notified_at = COALESCE(?, last_notified_at), \
             consecutive_failures = COALESCE(?, consecutive_failures) WHERE id = ?",
            params![
                update.last_notified_at.map(to_millis),
                update.consecutive_failures.map(i64::from),
                id.to_string()
            ],
        )
        .await?;

        Ok(())
    }

    async fn increment_rule_failures(&self, service_id: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE notification_rules SET consecutive_failures = consecutive_failures + 1 \
             WHERE service_id = ? AND enabled = 1",
            params![service_id.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn reset_rule_failures(&self, service_id: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE notification_rules SET consecutive_failures = 0 WHERE service_id = ? AND consecutive_failures > 0",
            params![service_id.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn append_notification_history(&self, entry: &NotificationHistoryEntry) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO notification_history \
             (rule_id, channel_id, service_id, event, status, error, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.rule_id.to_string(),
                entry.channel_id.to_string(),
                entry.service_id.to_string(),
                entry.event.to_string(),
                entry.status.as_str().to_string(),
                entry.error.clone(),
                entry.metadata.to_string(),
                to_millis(entry.created_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn save_service(&self, service: &Service) -> Result<()> {
        validate_service(service).map_err(DatabaseError::Invalid)?;

        let conn = self.get_conn().await?;
        let headers = if service.headers.is_empty() { None } else { Some(to_json(&service.headers, "services")?) };

        conn.execute(
            "INSERT INTO services (id, name, service_type, target, check_interval_seconds, is_active, status, \
             response_time_ms, total_monitored_time_ms, online_time_ms, uptime_percent, last_checked_at, \
             content_match_pattern, headers, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, service_type = excluded.service_type, \
             target = excluded.target, check_interval_seconds = excluded.check_interval_seconds, \
             is_active = excluded.is_active, content_match_pattern = excluded.content_match_pattern, \
             headers = excluded.headers, updated_at = excluded.updated_at",
            params![
                service.id.to_string(),
                service.name.clone(),
                service.service_type.to_string(),
                service.target.clone(),
                service.check_interval_seconds as i64,
                i64::from(service.is_active),
                service.status.to_string(),
                service.response_time_ms.map(|v| v as i64),
                service.total_monitored_time_ms,
                service.online_time_ms,
                service.uptime_percent,
                service.last_checked_at.map(to_millis),
                service.content_match_pattern.clone(),
                headers,
                to_millis(service.created_at),
                to_millis(Utc::now())
            ],
        )
        .await?;

        Ok(())
    }

    async fn delete_service(&self, id: Uuid) -> Result<bool> {
        let conn = self.get_conn().await?;
        let id = id.to_string();

        // Children first, so the cascade holds even on connections without foreign keys.
        let children = [
            "service_logs",
            "performance_metrics",
            "notification_history",
            "notification_rules",
            "maintenance_windows",
        ];
        for table in children {
            conn.execute(&format!("DELETE FROM {table} WHERE service_id = ?"), params![id.clone()]).await?;
        }
        let deleted = conn.execute("DELETE FROM services WHERE id = ?", params![id]).await?;

        Ok(deleted > 0)
    }

    async fn save_channel(&self, channel: &NotificationChannel) -> Result<()> {
        let conn = self.get_conn().await?;
        let config = channel.config.as_ref().map(|config| to_json(config, "notification_channels")).transpose()?;

        conn.execute(
            "INSERT INTO notification_channels (id, name, enabled, config, created_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, enabled = excluded.enabled, config = excluded.config",
            params![
                channel.id.to_string(),
                channel.name.clone(),
                i64::from(channel.enabled),
                config,
                to_millis(channel.created_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn save_rule(&self, rule: &NotificationRule) -> Result<()> {
        let conn = self.get_conn().await?;
        let events: Vec<&str> = rule.events.iter().map(|event| event.as_str()).collect();

        conn.execute(
            "INSERT INTO notification_rules (id, service_id, channel_id, events, threshold, cooldown_seconds, \
             consecutive_failures, last_notified_at, enabled, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET channel_id = excluded.channel_id, events = excluded.events, \
             threshold = excluded.threshold, cooldown_seconds = excluded.cooldown_seconds, enabled = excluded.enabled",
            params![
                rule.id.to_string(),
                rule.service_id.to_string(),
                rule.channel_id.to_string(),
                to_json(&events, "notification_rules")?,
                i64::from(rule.threshold),
                rule.cooldown_seconds as i64,
                i64::from(rule.consecutive_failures),
                rule.last_notified_at.map(to_millis),
                i64::from(rule.enabled),
                to_millis(rule.created_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<NotificationRule>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {RULE_COLUMNS} FROM notification_rules r WHERE r.id = ?"), params![id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_rule(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_maintenance_window(&self, window: &MaintenanceWindow) -> Result<()> {
        if window.end_time < window.start_time {
            return Err(DatabaseError::Invalid("maintenance window ends before it starts".to_string()));
        }

        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO maintenance_windows (id, service_id, title, start_time, end_time, is_active) \
             VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(id) DO UPDATE SET title = excluded.title, \
             start_time = excluded.start_time, end_time = excluded.end_time, is_active = excluded.is_active",
            params![
                window.id.to_string(),
                window.service_id.to_string(),
                window.title.clone(),
                to_millis(window.start_time),
                to_millis(window.end_time),
                i64::from(window.is_active)
            ],
        )
        .await?;

        Ok(())
    }

    async fn recent_service_logs(&self, service_id: Uuid, limit: usize) -> Result<Vec<ServiceLogEntry>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, service_id, status, response_time_ms, message, content_match, data, checked_at \
                 FROM service_logs WHERE service_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
                params![service_id.to_string(), limit as i64],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: Option<ProbeData> =
                parse_stored_json(row.get::<Option<String>>(6)?.as_deref(), "data", service_id);

            entries.push(ServiceLogEntry {
                id: Some(row.get(0)?),
                service_id: parse_uuid(&row.get::<String>(1)?, "service_logs")?,
                status: row.get::<String>(2)?.parse().map_err(|e| DatabaseError::corrupt("service_logs", e))?,
                response_time_ms: row.get::<i64>(3)?.max(0) as u64,
                message: row.get(4)?,
                content_match: row.get::<Option<i64>>(5)?.map(|v| v != 0),
                data,
                checked_at: from_millis(row.get(7)?),
            });
        }

        Ok(entries)
    }

    async fn recent_performance_metrics(&self, service_id: Uuid, limit: usize) -> Result<Vec<PerformanceMetric>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, service_id, response_time_ms, status, uptime_percent, recorded_at \
                 FROM performance_metrics WHERE service_id = ? ORDER BY recorded_at DESC, id DESC LIMIT ?",
                params![service_id.to_string(), limit as i64],
            )
            .await?;

        let mut metrics = Vec::new();
        while let Some(row) = rows.next().await? {
            metrics.push(PerformanceMetric {
                id: Some(row.get(0)?),
                service_id: parse_uuid(&row.get::<String>(1)?, "performance_metrics")?,
                response_time_ms: row.get::<i64>(2)?.max(0) as u64,
                status: row.get::<String>(3)?.parse().map_err(|e| DatabaseError::corrupt("performance_metrics", e))?,
                uptime_percent: row.get(4)?,
                recorded_at: from_millis(row.get(5)?),
            });
        }

        Ok(metrics)
    }

    async fn notification_history(&self, service_id: Uuid, limit: usize) -> Result<Vec<NotificationHistoryEntry>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, rule_id, channel_id, service_id, event, status, error, metadata, created_at \
                 FROM notification_history WHERE service_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
                params![service_id.to_string(), limit as i64],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let status = match row.get::<String>(5)?.as_str() {
                "sent" => DeliveryStatus::Sent,
                "failed" => DeliveryStatus::Failed,
                other => return Err(DatabaseError::corrupt("notification_history", format!("bad status '{other}'"))),
            };

            entries.push(NotificationHistoryEntry {
                id: Some(row.get(0)?),
                rule_id: parse_uuid(&row.get::<String>(1)?, "notification_history")?,
                channel_id: parse_uuid(&row.get::<String>(2)?, "notification_history")?,
                service_id: parse_uuid(&row.get::<String>(3)?, "notification_history")?,
                event: row.get::<String>(4)?.parse().map_err(|e| DatabaseError::corrupt("notification_history", e))?,
                status,
                error: row.get(6)?,
                metadata: parse_stored_json(row.get::<Option<String>>(7)?.as_deref(), "metadata", service_id)
                    .unwrap_or_default(),
                created_at: from_millis(row.get(8)?),
            });
        }

        Ok(entries)
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        Ok(conn.execute("DELETE FROM service_logs WHERE checked_at < ?", params![to_millis(cutoff)]).await?)
    }

    async fn delete_metrics_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        Ok(conn.execute("DELETE FROM performance_metrics WHERE recorded_at < ?", params![to_millis(cutoff)]).await?)
    }

    async fn delete_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        Ok(conn.execute("DELETE FROM notification_history WHERE created_at < ?", params![to_millis(cutoff)]).await?)
    }
}
