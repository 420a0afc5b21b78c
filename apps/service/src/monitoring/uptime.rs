//! Time-weighted availability accounting.
//!
//! Time between two checks is attributed to the status observed by the later one.
//! Degraded counts as available: the service answered, just not well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::ServiceStatus;

/// Cumulative availability of one service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeState {
    pub total_monitored_time_ms: i64,
    pub online_time_ms: i64,
    pub uptime_percent: f64,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Default for UptimeState {
    fn default() -> Self {
        Self { total_monitored_time_ms: 0, online_time_ms: 0, uptime_percent: 100.0, last_checked_at: None }
    }
}

/// Fold one check result into the previous cumulative state
pub fn accumulate(prev: &UptimeState, status: ServiceStatus, now: DateTime<Utc>) -> UptimeState {
    let available = status.is_available();

    let Some(last_checked_at) = prev.last_checked_at else {
        return UptimeState {
            total_monitored_time_ms: 0,
            online_time_ms: 0,
            uptime_percent: if available { 100.0 } else { 0.0 },
            last_checked_at: Some(now),
        };
    };

    // A clock that went backwards contributes nothing.
    let elapsed = (now - last_checked_at).num_milliseconds().max(0);

    let total = prev.total_monitored_time_ms.max(0).saturating_add(elapsed);
    let online = prev.online_time_ms.clamp(0, prev.total_monitored_time_ms.max(0));
    let online = if available { online.saturating_add(elapsed) } else { online };

    UptimeState {
        total_monitored_time_ms: total,
        online_time_ms: online,
        uptime_percent: percentage(online, total),
        last_checked_at: Some(now),
    }
}

fn percentage(online_ms: i64, total_ms: i64) -> f64 {
    if total_ms <= 0 {
        return 100.0;
    }
    (online_ms as f64 / total_ms as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn first_check_starts_the_clock() {
        let online = accumulate(&UptimeState::default(), ServiceStatus::Online, start());
        assert_eq!(online.total_monitored_time_ms, 0);
        assert_eq!(online.uptime_percent, 100.0);
        assert_eq!(online.last_checked_at, Some(start()));

        let degraded = accumulate(&UptimeState::default(), ServiceStatus::Degraded, start());
        assert_eq!(degraded.uptime_percent, 100.0);

        let offline = accumulate(&UptimeState::default(), ServiceStatus::Offline, start());
        assert_eq!(offline.total_monitored_time_ms, 0);
        assert_eq!(offline.uptime_percent, 0.0);
        assert_eq!(offline.last_checked_at, Some(start()));
    }

    #[test]
    fn elapsed_time_goes_to_the_later_status() {
        let first = accumulate(&UptimeState::default(), ServiceStatus::Online, start());
        let second = accumulate(&first, ServiceStatus::Offline, start() + Duration::seconds(60));

        assert_eq!(second.total_monitored_time_ms, 60_000);
        assert_eq!(second.online_time_ms, 0);
        assert_eq!(second.uptime_percent, 0.0);

        let third = accumulate(&second, ServiceStatus::Degraded, start() + Duration::seconds(120));
        assert_eq!(third.total_monitored_time_ms, 120_000);
        assert_eq!(third.online_time_ms, 60_000);
        assert_eq!(third.uptime_percent, 50.0);
    }

    #[test]
    fn same_inputs_produce_same_state() {
        let prev = UptimeState {
            total_monitored_time_ms: 10_000,
            online_time_ms: 7_500,
            uptime_percent: 75.0,
            last_checked_at: Some(start()),
        };
        let now = start() + Duration::seconds(30);

        assert_eq!(
            accumulate(&prev, ServiceStatus::Timeout, now),
            accumulate(&prev, ServiceStatus::Timeout, now)
        );
    }

    #[test]
    fn clock_skew_adds_no_time() {
        let prev = UptimeState {
            total_monitored_time_ms: 1_000,
            online_time_ms: 1_000,
            uptime_percent: 100.0,
            last_checked_at: Some(start()),
        };
        let next = accumulate(&prev, ServiceStatus::Offline, start() - Duration::seconds(5));
        assert_eq!(next.total_monitored_time_ms, 1_000);
        assert_eq!(next.online_time_ms, 1_000);
    }

    #[test]
    fn online_time_never_exceeds_total_over_a_sequence() {
        let statuses = [
            ServiceStatus::Offline,
            ServiceStatus::Online,
            ServiceStatus::Degraded,
            ServiceStatus::Timeout,
            ServiceStatus::Online,
            ServiceStatus::Offline,
        ];
        let mut state = UptimeState::default();
        let mut now = start();

        for (step, status) in statuses.iter().cycle().take(60).enumerate() {
            now += Duration::milliseconds(500 + (step as i64 * 7919) % 45_000);
            state = accumulate(&state, *status, now);

            assert!(state.online_time_ms <= state.total_monitored_time_ms);
            assert!((0.0..=100.0).contains(&state.uptime_percent));
        }
    }

    #[test]
    fn inconsistent_stored_state_is_repaired() {
        let prev = UptimeState {
            total_monitored_time_ms: 1_000,
            online_time_ms: 5_000,
            uptime_percent: 500.0,
            last_checked_at: Some(start()),
        };
        let next = accumulate(&prev, ServiceStatus::Online, start() + Duration::seconds(1));
        assert_eq!(next.total_monitored_time_ms, 2_000);
        assert_eq!(next.online_time_ms, 2_000);
        assert_eq!(next.uptime_percent, 100.0);
    }
}
