use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::Database;

/// Answers whether alerting for a service is currently suppressed
#[async_trait]
pub trait MaintenanceOracle: Send + Sync {
    async fn is_under_maintenance(&self, service_id: Uuid, now: DateTime<Utc>) -> bool;
}

/// Looks up maintenance windows in storage
pub struct StoredMaintenanceOracle {
    database: Arc<dyn Database>,
}

impl StoredMaintenanceOracle {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl MaintenanceOracle for StoredMaintenanceOracle {
    /// A failed lookup counts as "not under maintenance", so alerts still go out.
    async fn is_under_maintenance(&self, service_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.database.find_active_maintenance_windows(service_id, now).await {
            Ok(windows) => windows.iter().any(|window| window.covers(now)),
            Err(error) => {
                tracing::warn!(%service_id, %error, "Maintenance lookup failed");
                false
            }
        }
    }
}
