use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Event a notification rule can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Down,
    Up,
    Degraded,
    SslExpiry,
    SslWarning,
    ContentMismatch,
}

impl NotificationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Degraded => "degraded",
            Self::SslExpiry => "ssl_expiry",
            Self::SslWarning => "ssl_warning",
            Self::ContentMismatch => "content_mismatch",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "down" => Ok(Self::Down),
            "up" => Ok(Self::Up),
            "degraded" => Ok(Self::Degraded),
            "ssl_expiry" => Ok(Self::SslExpiry),
            "ssl_warning" => Ok(Self::SslWarning),
            "content_mismatch" => Ok(Self::ContentMismatch),
            other => Err(format!("unknown notification event '{other}'")),
        }
    }
}

pub type EventSet = BTreeSet<NotificationEvent>;

/// One reason to run the dispatcher for a service.
///
/// `sustained` marks a `down` trigger raised while the service was already failing
/// on the previous check, as opposed to the transition into failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub event: NotificationEvent,
    pub sustained: bool,
}

impl Trigger {
    pub fn new(event: NotificationEvent) -> Self {
        Self { event, sustained: false }
    }

    pub fn sustained_outage() -> Self {
        Self { event: NotificationEvent::Down, sustained: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip_through_serde() {
        let events: EventSet = serde_json::from_str(r#"["down","ssl_warning","up"]"#).unwrap();
        assert!(events.contains(&NotificationEvent::SslWarning));
        assert_eq!(serde_json::to_string(&NotificationEvent::ContentMismatch).unwrap(), "\"content_mismatch\"");
    }
}
