//! Prometheus metrics for the AI Status Monitor
//!
//! - `ai_status_polls_total` (counter) - completed polls by aggregate status
//! - `ai_status_response_time_ms` (gauge) - response time of the last poll
//! - `ai_status_healthy` (gauge) - 1 when the last poll was healthy
//!
//! Metrics are fed by a status listener, so they move once per completed poll.

use aarambh_status::{HealthData, StatusService, Subscription};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Status metrics registry
pub struct StatusMetrics {
    registry: Registry,
    polls_total: IntCounterVec,
    response_time_ms: IntGauge,
    healthy: IntGauge,
}

impl StatusMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("ai_status_polls_total", "Completed AI status polls by aggregate status"),
            &["status"],
        )?;
        let response_time_ms = IntGauge::new(
            "ai_status_response_time_ms",
            "Response time of the winning probe in the last poll",
        )?;
        let healthy = IntGauge::new("ai_status_healthy", "1 when the last poll was healthy")?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(response_time_ms.clone()))?;
        registry.register(Box::new(healthy.clone()))?;

        Ok(Self {
            registry,
            polls_total,
            response_time_ms,
            healthy,
        })
    }

    /// Record a published status; in-progress and initial states are skipped
    pub fn record(&self, data: &HealthData) {
        if !data.status.is_settled() {
            return;
        }
        self.polls_total
            .with_label_values(&[data.status.as_str()])
            .inc();
        self.response_time_ms.set(data.response_time_ms as i64);
        self.healthy.set(i64::from(data.is_healthy()));
    }

    /// Subscribe these metrics to `service`
    pub fn attach(self: &Arc<Self>, service: &StatusService) -> Subscription {
        let metrics = Arc::clone(self);
        service.subscribe(move |data| metrics.record(data))
    }

    /// Completed polls with the given status
    pub fn polls(&self, status: &str) -> u64 {
        self.polls_total.with_label_values(&[status]).get()
    }

    /// Prometheus text exposition
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}
