//! Polling service
//!
//! Owns the lifecycle of the health poll: nothing runs until [`StatusService::start`]
//! is called, and [`StatusService::stop`] ends the loop. There is no supervision;
//! a stopped service stays stopped until started again.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::contracts::HealthData;
use crate::engine::{HealthMonitor, Subscription};

/// Default poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic driver around a [`HealthMonitor`]
pub struct StatusService {
    monitor: Arc<HealthMonitor>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusService {
    pub fn new(monitor: Arc<HealthMonitor>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            monitor,
            clock,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Start polling: one check now, then one per interval
    ///
    /// Returns `false` if the loop was already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let monitor = Arc::clone(&self.monitor);
        let clock = Arc::clone(&self.clock);
        let interval = self.interval;

        tracing::info!(
            interval_secs = interval.as_secs(),
            probes = ?monitor.probe_ids(),
            "Starting AI status polling"
        );

        *task = Some(tokio::spawn(async move {
            loop {
                monitor.check_health().await;
                clock.sleep(interval).await;
            }
        }));
        true
    }

    /// Stop polling; an in-flight poll is abandoned
    pub fn stop(&self) -> bool {
        match self.lock_task().take() {
            Some(handle) => {
                handle.abort();
                tracing::info!("Stopped AI status polling");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Manual check through the same re-entrancy guard as the timer
    pub async fn force_check(&self) -> HealthData {
        tracing::debug!("Forced AI status check");
        self.monitor.check_health().await
    }

    pub fn current(&self) -> HealthData {
        self.monitor.current()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HealthData) + Send + Sync + 'static,
    {
        self.monitor.subscribe(listener)
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for StatusService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::contracts::{HealthStatus, ProbeReport, ServiceMap};
    use crate::engine::{HealthProbe, ProbeFuture};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
    }

    impl HealthProbe for CountingProbe {
        fn id(&self) -> &str {
            "counting"
        }

        fn probe(&self) -> ProbeFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(ProbeReport {
                    probe: "counting".to_string(),
                    status: HealthStatus::Healthy,
                    services: ServiceMap::new(),
                    response_time_ms: 1,
                    server: None,
                })
            })
        }
    }

    fn service(calls: &Arc<AtomicUsize>) -> StatusService {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let probe: Arc<dyn HealthProbe> = Arc::new(CountingProbe {
            calls: Arc::clone(calls),
        });
        let monitor = Arc::new(HealthMonitor::new(vec![probe], Arc::clone(&clock)));
        StatusService::new(monitor, clock, DEFAULT_POLL_INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_per_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service(&calls);

        assert!(service.start());
        assert!(!service.start());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.current().status, HealthStatus::Healthy);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(service.stop());
        assert!(!service.is_running());
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_check_without_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service(&calls);

        let data = service.force_check().await;

        assert_eq!(data.status, HealthStatus::Healthy);
        assert!(!service.is_running());
        assert!(!service.stop());
    }
}
