/// Monitoring engine module - handles execution of monitoring checks
///
/// This module is responsible for:
/// - Executing HTTP/HTTPS, ping, DNS, TCP and certificate checks
/// - Accumulating uptime from consecutive results
/// - Scheduling one check task per active service
/// - Turning status changes into notification triggers
pub mod executor;
pub mod maintenance;
pub mod probes;
pub mod scheduler;
pub mod transition;
pub mod types;
pub mod uptime;


pub use executor::ProbeExecutor;
pub use maintenance::{MaintenanceOracle, StoredMaintenanceOracle};
pub use scheduler::{MonitoringScheduler, TickOutcome};
pub use types::{CheckResult, ServiceStatus, ServiceType};
