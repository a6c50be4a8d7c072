//! Health Monitor
//!
//! Keeps the latest per-service health snapshot and refreshes it on demand
//! or on a polling interval.

use std::sync::Arc;
use std::time::Duration;

use dashboard_client::ServiceClient;
use dashboard_core::{HealthRecord, Service, SystemHealth};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Shortest period accepted by the polling loops
pub const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Raise `period` to [`MIN_POLL_PERIOD`], logging when it had to be clamped
pub(crate) fn clamp_poll_period(period: Duration) -> Duration {
    if period < MIN_POLL_PERIOD {
        warn!(
            "Polling period {:?} is below the minimum, using {:?}",
            period, MIN_POLL_PERIOD
        );
        MIN_POLL_PERIOD
    } else {
        period
    }
}

/// Tracks system health across all backend services
pub struct HealthMonitor {
    client: ServiceClient,
    latest: watch::Sender<SystemHealth>,
}

impl HealthMonitor {
    /// Create a monitor whose snapshot starts with every service `unknown`
    pub fn new(client: ServiceClient) -> Self {
        let (latest, _) = watch::channel(SystemHealth::unknown());
        Self { client, latest }
    }

    /// Probe every service and replace the snapshot
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> SystemHealth {
        let health = self.client.check_all_services_health().await;
        self.latest.send_replace(health.clone());
        health
    }

    /// Probe one service and update its record in the snapshot
    #[instrument(skip(self))]
    pub async fn check_one(&self, service: Service) -> HealthRecord {
        let response = self.client.check_health(service).await;
        let record = HealthRecord::from_response(&response);
        debug!("{} service health: {:?}", service, record.status);

        self.latest
            .send_modify(|health| health.update(service, record.clone()));
        record
    }

    /// Latest snapshot without probing
    pub fn latest(&self) -> SystemHealth {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemHealth> {
        self.latest.subscribe()
    }

    /// Start a background task that checks every service each `period`,
    /// beginning immediately
    pub fn start_polling(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = clamp_poll_period(period);
        info!("Starting health polling every {}s", period.as_secs());

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_all().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_client::RequestExecutor;
    use dashboard_core::{EndpointRegistry, HealthStatus, OverallHealth};

    fn unreachable_client() -> ServiceClient {
        // Port 9 (discard) refuses connections on loopback
        ServiceClient::with_executor(
            RequestExecutor::new(Duration::from_secs(1)),
            EndpointRegistry::uniform("http://127.0.0.1:9/api").unwrap(),
        )
    }

    #[test]
    fn test_initial_snapshot_is_unknown() {
        let monitor = HealthMonitor::new(unreachable_client());
        let health = monitor.latest();

        assert_eq!(health.overall, OverallHealth::Degraded);
        assert!(health
            .services
            .values()
            .all(|record| record.status == HealthStatus::Unknown));
    }

    #[tokio::test]
    async fn test_failed_probe_updates_one_record() {
        let monitor = HealthMonitor::new(unreachable_client());
        let mut rx = monitor.subscribe();

        let record = monitor.check_one(Service::News).await;
        assert_eq!(record.status, HealthStatus::Error);
        assert!(rx.has_changed().unwrap());

        let health = monitor.latest();
        assert_eq!(health.services[&Service::News].status, HealthStatus::Error);
        assert_eq!(health.services[&Service::Price].status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_zero_period_polling_keeps_running() {
        let monitor = Arc::new(HealthMonitor::new(unreachable_client()));
        let mut rx = monitor.subscribe();

        let poller = Arc::clone(&monitor).start_polling(Duration::ZERO);
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();

        assert!(!poller.is_finished());
        assert_eq!(monitor.latest().services[&Service::Price].status, HealthStatus::Error);
        poller.abort();
    }
}
