use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::executor::ProbeExecutor;
use super::maintenance::MaintenanceOracle;
use super::transition::{CertificateHistory, SslAlertPolicy, collect_triggers};
use super::types::{CheckResult, ServiceStatus, ServiceType};
use super::uptime::accumulate;
use crate::database::models::{PerformanceMetric, Service, ServiceLogEntry, ServiceStateUpdate, SslMetadata};
use crate::database::{Database, DatabaseError};
use crate::notification::{NotificationDispatcher, NotificationEvent};

/// What a single tick ended with
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The check ran and was persisted. `interval` is the service's current period.
    Completed { result: CheckResult, interval: Duration },
    /// The service is gone or inactive; its timer should end.
    Stopped,
    /// Storage failed part way; the next tick tries again.
    Aborted,
}

struct TimerHandle {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// One lock per service with a check in progress, so ticks never overlap
#[derive(Default)]
struct TickLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TickLocks {
    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.lock().await.entry(id).or_default().clone();
        lock.lock_owned().await
    }

    async fn release(&self, id: Uuid, guard: OwnedMutexGuard<()>) {
        let mut locks = self.locks.lock().await;
        drop(guard);
        // Every waiter holds a clone, so a count of one means nobody else wants it.
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }
}

/// Whether a tick may still write the in-memory state kept for `id`.
///
/// A timer's tick loses that right once its timer is stopped or replaced. Direct
/// `run_tick` calls (`generation` is `None`) always keep it.
fn owns_state(timers: &HashMap<Uuid, TimerHandle>, id: Uuid, generation: Option<u64>) -> bool {
    generation.is_none_or(|generation| timers.get(&id).is_some_and(|handle| handle.generation == generation))
}

struct SchedulerInner {
    database: Arc<dyn Database>,
    executor: ProbeExecutor,
    dispatcher: NotificationDispatcher,
    maintenance: Arc<dyn MaintenanceOracle>,
    ssl_policy: SslAlertPolicy,
    timers: RwLock<HashMap<Uuid, TimerHandle>>,
    last_status: RwLock<HashMap<Uuid, ServiceStatus>>,
    ssl_warned_at: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    generation: AtomicU64,
    tick_locks: TickLocks,
}

/// Monitoring scheduler - one recurring check task per active service
#[derive(Clone)]
pub struct MonitoringScheduler {
    inner: Arc<SchedulerInner>,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        database: Arc<dyn Database>,
        executor: ProbeExecutor,
        dispatcher: NotificationDispatcher,
        maintenance: Arc<dyn MaintenanceOracle>,
        ssl_policy: SslAlertPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                database,
                executor,
                dispatcher,
                maintenance,
                ssl_policy,
                timers: RwLock::new(HashMap::new()),
                last_status: RwLock::new(HashMap::new()),
                ssl_warned_at: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
                tick_locks: TickLocks::default(),
            }),
        }
    }

    /// Start (or restart) the timer for a service.
    ///
    /// The first check runs immediately, once any check still running for the service has
    /// finished. An inactive service is stopped instead.
    pub async fn start_monitoring(&self, service: &Service) {
        if !service.is_active {
            self.stop_monitoring(service.id).await;
            return;
        }

        let id = service.id;
        let period = service.check_interval();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        // Held across the spawn so a task that stops itself on its first tick
        // always finds its own entry.
        let mut timers = self.inner.timers.write().await;
        let task = tokio::spawn(self.clone().run_timer(id, generation, period, cancel.clone()));
        if let Some(previous) = timers.insert(id, TimerHandle { generation, cancel, task }) {
            previous.cancel.cancel();
        }

        info!(service_id = %id, interval_seconds = period.as_secs(), "Started monitoring");
    }

    /// Cancel a service's timer. An in-flight check still completes.
    pub async fn stop_monitoring(&self, service_id: Uuid) -> bool {
        let removed = self.inner.timers.write().await.remove(&service_id);
        self.inner.last_status.write().await.remove(&service_id);
        self.inner.ssl_warned_at.write().await.remove(&service_id);

        match removed {
            Some(handle) => {
                handle.cancel.cancel();
                info!(%service_id, "Stopped monitoring");
                true
            }
            None => false,
        }
    }

    /// Cancel every timer and wait for in-flight checks to finish
    pub async fn stop_all_monitoring(&self) {
        let handles: Vec<TimerHandle> = self.inner.timers.write().await.drain().map(|(_, handle)| handle).collect();
        for handle in &handles {
            handle.cancel.cancel();
        }

        let count = handles.len();
        for handle in handles {
            if let Err(error) = handle.task.await {
                warn!(%error, "Monitoring task ended abnormally");
            }
        }

        self.inner.last_status.write().await.clear();
        self.inner.ssl_warned_at.write().await.clear();
        info!(count, "Stopped all monitoring");
    }

    /// Start a timer for every active service, returning how many were started
    pub async fn start_all_monitoring(&self) -> Result<usize, DatabaseError> {
        let services = self.inner.database.list_active_services().await?;
        for service in &services {
            self.start_monitoring(service).await;
        }
        Ok(services.len())
    }

    /// Run the service's probe now, outside its timer. Nothing is persisted.
    pub async fn run_on_demand_check(&self, service: &Service) -> CheckResult {
        self.inner.executor.execute(service).await
    }

    pub async fn is_monitoring(&self, service_id: Uuid) -> bool {
        self.inner.timers.read().await.contains_key(&service_id)
    }

    pub async fn monitored_services(&self) -> Vec<Uuid> {
        self.inner.timers.read().await.keys().copied().collect()
    }

    /// Status seen by the most recent tick since monitoring started
    pub async fn last_known_status(&self, service_id: Uuid) -> Option<ServiceStatus> {
        self.inner.last_status.read().await.get(&service_id).copied()
    }

    async fn run_timer(self, id: Uuid, generation: u64, mut period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Outside the select: cancellation never interrupts a running check.
            match self.guarded_tick(id, Utc::now(), Some(generation)).await {
                TickOutcome::Completed { interval: current, .. } if current != period => {
                    debug!(service_id = %id, interval_seconds = current.as_secs(), "Check interval changed");
                    period = current;
                    ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }
                TickOutcome::Completed { .. } | TickOutcome::Aborted => {}
                TickOutcome::Stopped => {
                    self.release_timer(id, generation).await;
                    break;
                }
            }
        }

        debug!(service_id = %id, "Monitoring task finished");
    }

    /// Drop the timer entry only if it still belongs to this task
    async fn release_timer(&self, id: Uuid, generation: u64) {
        let mut timers = self.inner.timers.write().await;
        if timers.get(&id).is_some_and(|handle| handle.generation == generation) {
            timers.remove(&id);
            drop(timers);
            self.inner.last_status.write().await.remove(&id);
            self.inner.ssl_warned_at.write().await.remove(&id);
            info!(service_id = %id, "Service missing or inactive, monitoring stopped");
        }
    }

    /// One complete check cycle for a service, as its timer runs it.
    ///
    /// `now` is the time the check is recorded at. Waits for any other check of the same
    /// service to finish first.
    pub async fn run_tick(&self, id: Uuid, now: DateTime<Utc>) -> TickOutcome {
        self.guarded_tick(id, now, None).await
    }

    async fn guarded_tick(&self, id: Uuid, now: DateTime<Utc>, generation: Option<u64>) -> TickOutcome {
        let guard = self.inner.tick_locks.acquire(id).await;
        let outcome = self.tick(id, now, generation).await;
        self.inner.tick_locks.release(id, guard).await;
        outcome
    }

    async fn tick(&self, id: Uuid, now: DateTime<Utc>, generation: Option<u64>) -> TickOutcome {
        let inner = &self.inner;

        let service = match inner.database.load_service(id).await {
            Ok(Some(service)) if service.is_active => service,
            Ok(_) => return TickOutcome::Stopped,
            Err(error) => {
                warn!(service_id = %id, %error, "Failed to load service");
                return TickOutcome::Aborted;
            }
        };

        let result = inner.executor.execute_at(&service, now).await;
        let certificate = match service.service_type {
            ServiceType::Https => inner.executor.inspect_certificate(&service, now).await.certificate().cloned(),
            ServiceType::Ssl => result.certificate().cloned(),
            _ => None,
        };

        let uptime = accumulate(&service.uptime_state(), result.status, now);
        let update = ServiceStateUpdate {
            status: result.status,
            response_time_ms: result.response_time_ms,
            uptime,
            ssl: certificate.as_ref().map(SslMetadata::from),
        };

        if let Err(error) = self.persist(&service, &result, &update, now).await {
            warn!(service_id = %id, %error, "Failed to persist check result");
            return TickOutcome::Aborted;
        }

        if result.status != ServiceStatus::Online {
            if let Err(error) = inner.database.increment_rule_failures(id).await {
                warn!(service_id = %id, %error, "Failed to count rule failures");
            }
        } else if service.status != ServiceStatus::Online {
            if let Err(error) = inner.database.reset_rule_failures(id).await {
                warn!(service_id = %id, %error, "Failed to reset rule failures");
            }
        }

        let previous = inner.last_status.read().await.get(&id).copied();
        let certificate_event = match &certificate {
            Some(cert) => {
                let history = CertificateHistory {
                    previous_days: service.ssl.as_ref().map(|ssl| ssl.days_remaining),
                    last_warning_at: inner.ssl_warned_at.read().await.get(&id).copied(),
                };
                inner.ssl_policy.classify(cert, history, now)
            }
            None => None,
        };
        let triggers = collect_triggers(previous, &result, certificate_event);

        if !triggers.is_empty() {
            if inner.maintenance.is_under_maintenance(id, now).await {
                trace!(service_id = %id, count = triggers.len(), "Notifications suppressed by maintenance window");
            } else {
                let mut snapshot = service.clone();
                snapshot.status = result.status;
                snapshot.uptime_percent = uptime.uptime_percent;

                for trigger in triggers {
                    if trigger.event == NotificationEvent::SslWarning {
                        let timers = inner.timers.read().await;
                        if owns_state(&timers, id, generation) {
                            inner.ssl_warned_at.write().await.insert(id, now);
                        }
                    }
                    inner.dispatcher.dispatch(&snapshot, trigger, &result, now).await;
                }
            }
        }

        {
            // Checked under the timers lock so a concurrent stop cannot interleave.
            let timers = inner.timers.read().await;
            if owns_state(&timers, id, generation) {
                inner.last_status.write().await.insert(id, result.status);
            }
        }

        debug!(
            service_id = %id,
            status = %result.status,
            response_time_ms = result.response_time_ms,
            uptime_percent = uptime.uptime_percent,
            "Check completed"
        );
        TickOutcome::Completed { result, interval: service.check_interval() }
    }

    async fn persist(
        &self,
        service: &Service,
        result: &CheckResult,
        update: &ServiceStateUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let database = &self.inner.database;
        database.update_service_state(service.id, update).await?;
        database.append_service_log(&ServiceLogEntry::from_check_result(service.id, result, now)).await?;
        database
            .append_performance_metric(&PerformanceMetric {
                id: None,
                service_id: service.id,
                response_time_ms: result.response_time_ms,
                status: result.status,
                uptime_percent: update.uptime.uptime_percent,
                recorded_at: now,
            })
            .await?;
        Ok(())
    }
}
