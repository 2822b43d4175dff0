//! Health aggregation engine
//!
//! Polls every configured probe in parallel, merges the outcomes into a single
//! [`HealthData`] and republishes it to registered listeners.
//!
//! Merge precedence is healthy > degraded > unhealthy. A failing probe counts
//! as unavailable and never fails the poll.

mod probes;
mod registry;

pub use probes::*;
pub use registry::*;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::clock::Clock;
use crate::contracts::*;
use crate::error::StatusError;

/// Merge probe outcomes for one polling cycle completed at `checked_at`
pub fn aggregate(
    outcomes: Vec<(String, Result<ProbeReport, StatusError>)>,
    checked_at: DateTime<Utc>,
) -> HealthData {
    let mut reports = Vec::new();
    let mut failures = Vec::new();

    for (probe, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(probe = %probe, error = %e.root(), "Health probe unavailable");
                failures.push(format!("{}: {}", probe, e.root()));
            }
        }
    }

    let fastest = |status: HealthStatus| {
        reports
            .iter()
            .filter(|r| r.status == status)
            .min_by_key(|r| r.response_time_ms)
    };

    if let Some(best) = fastest(HealthStatus::Healthy).or_else(|| fastest(HealthStatus::Degraded)) {
        return HealthData::from_report(best, checked_at);
    }

    let error = if !failures.is_empty() {
        format!("AI services unavailable ({})", failures.join("; "))
    } else if !reports.is_empty() {
        "All AI services reported unhealthy".to_string()
    } else {
        "No health probes configured".to_string()
    };

    let mut data = HealthData::unhealthy(error, checked_at);
    if let Some(report) = reports.iter().min_by_key(|r| r.response_time_ms) {
        data.services = report.services.clone();
        data.response_time_ms = report.response_time_ms;
        data.server = report.server.clone();
    }
    data
}

/// Multi-probe health aggregator with a non-blocking re-entrancy guard
pub struct HealthMonitor {
    probes: Vec<Arc<dyn HealthProbe>>,
    clock: Arc<dyn Clock>,
    state: Mutex<HealthData>,
    /// Serializes publication against subscription
    publish: Mutex<()>,
    listeners: ListenerRegistry,
    in_flight: AtomicBool,
    /// Result of the most recently finished (or abandoned) poll
    completed: watch::Sender<Option<HealthData>>,
}

impl HealthMonitor {
    /// Create a monitor over `probes`; status starts as `unknown`
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>, clock: Arc<dyn Clock>) -> Self {
        let (completed, _) = watch::channel(None);
        Self {
            probes,
            clock,
            state: Mutex::new(HealthData::unknown()),
            publish: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            in_flight: AtomicBool::new(false),
            completed,
        }
    }

    /// Last published (or in-progress) status
    pub fn current(&self) -> HealthData {
        lock(&self.state).clone()
    }

    /// Whether a poll is in flight
    pub fn is_checking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn probe_ids(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Register a listener
    ///
    /// The listener is called at once with the current status, then once per
    /// completed poll until the returned [`Subscription`] is dropped.
    /// Listeners must not call `subscribe` from inside the callback.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HealthData) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let _publishing = lock(&self.publish);

        let current = self.current();
        let subscription = self.listeners.add(Arc::clone(&listener));
        registry::invoke(subscription.id(), &listener, &current);
        subscription
    }

    /// Poll every probe and publish the merged status
    ///
    /// If a poll is already in flight no new probes are sent; the caller waits
    /// for the in-flight poll and receives its result.
    pub async fn check_health(&self) -> HealthData {
        let mut completed = self.completed.subscribe();

        let guard = match PollGuard::acquire(self) {
            Some(guard) => guard,
            None => {
                tracing::debug!("Health poll already in flight, waiting for it");
                if completed.changed().await.is_err() {
                    return self.current();
                }
                let finished = completed.borrow_and_update().clone();
                return finished.unwrap_or_else(|| self.current());
            }
        };

        let start = self.clock.now_ms();
        {
            let mut state = lock(&self.state);
            *state = state.checking();
        }

        let checks = self.probes.iter().map(|probe| {
            let id = probe.id().to_string();
            let future = probe.probe();
            async move { (id, future.await) }
        });
        let outcomes = futures::future::join_all(checks).await;

        let data = aggregate(outcomes, self.clock.now_utc());
        tracing::info!(
            status = %data.status,
            probes = self.probes.len(),
            response_time_ms = data.response_time_ms,
            duration_ms = self.clock.now_ms().saturating_sub(start),
            "Health poll completed"
        );

        self.publish(data.clone());
        guard.finish(data.clone());
        data
    }

    /// Store `data` and notify every listener
    fn publish(&self, data: HealthData) {
        let _publishing = lock(&self.publish);
        *lock(&self.state) = data.clone();

        let delivered = self.listeners.notify(&data);
        tracing::debug!(
            listeners = self.listeners.len(),
            delivered = delivered,
            "Published health status"
        );
    }
}

/// Try-lock on the in-flight flag
///
/// Released on drop, handing the poll's result to waiting callers. If the poll
/// was abandoned before publishing, the previous status is restored and handed
/// over instead.
struct PollGuard<'a> {
    monitor: &'a HealthMonitor,
    previous: HealthData,
    finished: Option<HealthData>,
}

impl<'a> PollGuard<'a> {
    fn acquire(monitor: &'a HealthMonitor) -> Option<Self> {
        monitor
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                monitor,
                previous: monitor.current(),
                finished: None,
            })
    }

    fn finish(mut self, data: HealthData) {
        self.finished = Some(data);
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        let result = match self.finished.take() {
            Some(data) => data,
            None => {
                tracing::warn!("Health poll abandoned before completion");
                *lock(&self.monitor.state) = self.previous.clone();
                self.previous.clone()
            }
        };
        // Waiters read the result from the channel, so a poll started right
        // after the flag clears cannot leak its `checking` state to them
        self.monitor.in_flight.store(false, Ordering::Release);
        self.monitor.completed.send_replace(Some(result));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    struct FixedProbe {
        id: String,
        outcome: Result<(HealthStatus, u64), String>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn healthy(id: &str, response_time_ms: u64) -> Arc<Self> {
            Self::with(id, Ok((HealthStatus::Healthy, response_time_ms)))
        }

        fn with(id: &str, outcome: Result<(HealthStatus, u64), String>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl HealthProbe for FixedProbe {
        fn id(&self) -> &str {
            &self.id
        }

        fn probe(&self) -> ProbeFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = self.id.clone();
            let outcome = self.outcome.clone();
            Box::pin(async move {
                match outcome {
                    Ok((status, response_time_ms)) => Ok(ProbeReport {
                        probe: id.clone(),
                        status,
                        services: ServiceMap::from([(id, true)]),
                        response_time_ms,
                        server: None,
                    }),
                    Err(e) => Err(StatusError::Transport(e)),
                }
            })
        }
    }

    fn checked_at() -> DateTime<Utc> {
        DateTime::<Utc>::default() + chrono::Duration::seconds(90)
    }

    /// Yields once before answering, so polls interleave across threads
    struct YieldingProbe;

    impl HealthProbe for YieldingProbe {
        fn id(&self) -> &str {
            "yielding"
        }

        fn probe(&self) -> ProbeFuture {
            Box::pin(async {
                tokio::task::yield_now().await;
                Ok(ProbeReport {
                    probe: "yielding".to_string(),
                    status: HealthStatus::Healthy,
                    services: ServiceMap::new(),
                    response_time_ms: 3,
                    server: None,
                })
            })
        }
    }

    fn monitor(probes: Vec<Arc<FixedProbe>>) -> HealthMonitor {
        let probes = probes
            .into_iter()
            .map(|p| p as Arc<dyn HealthProbe>)
            .collect();
        HealthMonitor::new(probes, Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_aggregate_prefers_fastest_healthy() {
        let report = |probe: &str, status, ms| ProbeReport {
            probe: probe.to_string(),
            status,
            services: ServiceMap::from([(probe.to_string(), true)]),
            response_time_ms: ms,
            server: None,
        };
        let data = aggregate(
            vec![
                ("slow".into(), Ok(report("slow", HealthStatus::Healthy, 300))),
                ("deg".into(), Ok(report("deg", HealthStatus::Degraded, 10))),
                ("fast".into(), Ok(report("fast", HealthStatus::Healthy, 90))),
            ],
            checked_at(),
        );

        assert_eq!(data.status, HealthStatus::Healthy);
        assert_eq!(data.response_time_ms, 90);
        assert!(data.service_available("fast"));
        assert!(data.error.is_none());
    }

    #[test]
    fn test_aggregate_degraded_without_healthy() {
        let data = aggregate(
            vec![
                ("a".into(), Err(StatusError::Timeout(500))),
                (
                    "b".into(),
                    Ok(ProbeReport {
                        probe: "b".into(),
                        status: HealthStatus::Degraded,
                        services: ServiceMap::new(),
                        response_time_ms: 40,
                        server: None,
                    }),
                ),
            ],
            checked_at(),
        );
        assert_eq!(data.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_aggregate_all_failed() {
        let data = aggregate(
            vec![
                ("a".into(), Err(StatusError::Transport("ECONNREFUSED".into()))),
                ("b".into(), Err(StatusError::Timeout(500))),
            ],
            checked_at(),
        );
        assert_eq!(data.status, HealthStatus::Unhealthy);
        assert_eq!(data.last_checked, Some(checked_at()));
        let error = data.error.unwrap();
        assert!(error.contains("ECONNREFUSED"));
        assert!(error.contains("b: Request timed out"));
    }

    #[test]
    fn test_aggregate_no_probes() {
        let data = aggregate(Vec::new(), checked_at());
        assert_eq!(data.status, HealthStatus::Unhealthy);
        assert!(data.error.is_some());
    }

    #[tokio::test]
    async fn test_check_health_publishes() {
        let monitor = monitor(vec![
            FixedProbe::healthy("gemini", 120),
            FixedProbe::with("backup", Err("ECONNREFUSED".into())),
        ]);
        assert_eq!(monitor.current().status, HealthStatus::Unknown);

        let data = monitor.check_health().await;

        assert_eq!(data.status, HealthStatus::Healthy);
        assert_eq!(data.response_time_ms, 120);
        assert_eq!(monitor.current(), data);
        assert!(!monitor.is_checking());
    }

    #[tokio::test]
    async fn test_subscribe_receives_current_immediately() {
        let monitor = monitor(vec![FixedProbe::healthy("gemini", 5)]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let subscription = monitor.subscribe(move |data| sink.lock().unwrap().push(data.status));
        assert_eq!(*seen.lock().unwrap(), vec![HealthStatus::Unknown]);

        monitor.check_health().await;
        monitor.check_health().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![HealthStatus::Unknown, HealthStatus::Healthy, HealthStatus::Healthy]
        );

        drop(subscription);
        assert_eq!(monitor.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_last_checked_comes_from_clock() {
        let probe: Arc<dyn HealthProbe> = FixedProbe::healthy("gemini", 10);
        let clock = Arc::new(ManualClock::starting_at(1_700_000_000_000));
        let monitor = HealthMonitor::new(vec![probe], clock.clone());

        let data = monitor.check_health().await;
        assert_eq!(
            data.last_checked.map(|at| at.timestamp_millis()),
            Some(1_700_000_000_000)
        );

        clock.advance(std::time::Duration::from_secs(300));
        let data = monitor.check_health().await;
        assert_eq!(
            data.last_checked.map(|at| at.timestamp_millis()),
            Some(1_700_000_300_000)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_only_see_finished_polls() {
        let probe: Arc<dyn HealthProbe> = Arc::new(YieldingProbe);
        let monitor = Arc::new(HealthMonitor::new(vec![probe], Arc::new(ManualClock::new())));

        let callers: Vec<_> = (0..16)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    let mut unsettled = 0;
                    for _ in 0..500 {
                        if !monitor.check_health().await.status.is_settled() {
                            unsettled += 1;
                        }
                    }
                    unsettled
                })
            })
            .collect();

        for caller in callers {
            assert_eq!(caller.await.unwrap(), 0);
        }
        assert_eq!(monitor.current().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_abandoned_poll_restores_previous_status() {
        struct NeverProbe;
        impl HealthProbe for NeverProbe {
            fn id(&self) -> &str {
                "never"
            }
            fn probe(&self) -> ProbeFuture {
                Box::pin(std::future::pending::<Result<ProbeReport, StatusError>>())
            }
        }

        let probe: Arc<dyn HealthProbe> = Arc::new(NeverProbe);
        let monitor = HealthMonitor::new(vec![probe], Arc::new(ManualClock::new()));

        let (abandoned, waiter) = tokio::join!(
            tokio::time::timeout(std::time::Duration::from_millis(10), monitor.check_health()),
            monitor.check_health(),
        );

        assert!(abandoned.is_err());
        // The waiter receives the restored status, not `checking`
        assert_eq!(waiter.status, HealthStatus::Unknown);
        assert!(!monitor.is_checking());
        assert_eq!(monitor.current().status, HealthStatus::Unknown);
    }
}
