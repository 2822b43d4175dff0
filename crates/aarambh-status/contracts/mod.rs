//! AI Status Contracts
//!
//! Wire and in-memory shapes shared by the aggregator, its subscribers and
//! the AI backends it polls.

mod ai;

pub use ai::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-service availability flags (`gemini`, `teacherAgent`, `imageGenerator`, ...)
pub type ServiceMap = BTreeMap<String, bool>;

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fully operational
    #[serde(alias = "ok", alias = "up")]
    Healthy,
    /// Operational with issues
    Degraded,
    /// Not operational
    #[serde(alias = "down")]
    Unhealthy,
    /// Poll in progress
    Checking,
    /// No poll has completed yet
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Checking => "checking",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Whether this status is the outcome of a completed poll
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            HealthStatus::Healthy | HealthStatus::Degraded | HealthStatus::Unhealthy
        )
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated AI-service health, republished after every poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    /// Aggregate status
    pub status: HealthStatus,

    /// Service availability of the winning probe
    #[serde(default)]
    pub services: ServiceMap,

    /// Response time of the winning probe in milliseconds
    #[serde(default)]
    pub response_time_ms: u64,

    /// Completion time of the poll that produced this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,

    /// Explanation when unhealthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Server that answered the winning probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl Default for HealthData {
    fn default() -> Self {
        Self::unknown()
    }
}

impl HealthData {
    /// State before the first poll
    pub fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            services: ServiceMap::new(),
            response_time_ms: 0,
            last_checked: None,
            error: None,
            server: None,
        }
    }

    /// Aggregate built from a successful probe, stamped with `checked_at`
    pub fn from_report(report: &ProbeReport, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: report.status,
            services: report.services.clone(),
            response_time_ms: report.response_time_ms,
            last_checked: Some(checked_at),
            error: None,
            server: report.server.clone(),
        }
    }

    /// Aggregate for a cycle in which no probe answered usefully
    pub fn unhealthy(error: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            services: ServiceMap::new(),
            response_time_ms: 0,
            last_checked: Some(checked_at),
            error: Some(error.into()),
            server: None,
        }
    }

    /// Same data, marked as being re-checked
    pub fn checking(&self) -> Self {
        Self {
            status: HealthStatus::Checking,
            ..self.clone()
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Whether a named service reported itself available
    pub fn service_available(&self, name: &str) -> bool {
        self.services.get(name).copied().unwrap_or(false)
    }
}

/// Outcome of a single successful probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// Probe name
    pub probe: String,

    /// Status reported by the backend
    pub status: HealthStatus,

    /// Service map reported by the backend
    pub services: ServiceMap,

    /// Reported or measured response time in milliseconds
    pub response_time_ms: u64,

    /// Server identifier, if any
    pub server: Option<String>,
}

/// `GET /api/ai/health` response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEnvelope {
    pub success: bool,

    pub data: Option<HealthPayload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `data` member of the health envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPayload {
    pub status: HealthStatus,

    #[serde(default)]
    pub services: ServiceMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}
