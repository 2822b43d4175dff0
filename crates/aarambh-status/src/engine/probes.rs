//! Health probe implementations
//!
//! A probe is a single health-check call against one backend service.

use std::future::Future;
use std::pin::Pin;

use crate::client::{Method, RetryingClient};
use crate::contracts::*;
use crate::error::{Result, StatusError};

/// Path of the AI health endpoint under the AI base URL
pub const HEALTH_PATH: &str = "/api/ai/health";

/// Boxed probe future returned by [`HealthProbe::probe`]
pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeReport>> + Send>>;

/// Trait for backend health probes
pub trait HealthProbe: Send + Sync {
    /// Probe identifier
    fn id(&self) -> &str;

    /// Run the probe (owned future so probes can run in parallel)
    fn probe(&self) -> ProbeFuture;
}

/// Probe of an AARAMBH AI `GET /api/ai/health` endpoint
pub struct HttpHealthProbe {
    name: String,
    url: String,
    client: RetryingClient,
}

impl HttpHealthProbe {
    /// Probe an explicit health URL
    pub fn new(name: impl Into<String>, url: impl Into<String>, client: RetryingClient) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    /// Probe `<base_url>/api/ai/health`
    pub fn for_base_url(name: impl Into<String>, base_url: &str, client: RetryingClient) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH);
        Self::new(name, url, client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthProbe for HttpHealthProbe {
    fn id(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> ProbeFuture {
        let name = self.name.clone();
        let url = self.url.clone();
        let client = self.client.clone();

        Box::pin(async move {
            let start = client.clock().now_ms();
            let envelope: HealthEnvelope = client.request_json(&url, None, Method::Get).await?;
            let measured_ms = client.clock().now_ms().saturating_sub(start);

            report_from_envelope(&name, envelope, measured_ms)
        })
    }
}

/// Validate a health envelope and turn it into a probe report
///
/// A reported `responseTime` takes precedence over the measured one.
pub fn report_from_envelope(
    probe: &str,
    envelope: HealthEnvelope,
    measured_ms: u64,
) -> Result<ProbeReport> {
    if !envelope.success {
        return Err(StatusError::decode(format!(
            "Health endpoint reported failure: {}",
            envelope.error.as_deref().unwrap_or("no reason given")
        )));
    }

    let data = envelope
        .data
        .ok_or_else(|| StatusError::decode("Health response has no data"))?;

    if !data.status.is_settled() {
        return Err(StatusError::decode(format!(
            "Health endpoint returned non-final status '{}'",
            data.status
        )));
    }

    Ok(ProbeReport {
        probe: probe.to_string(),
        status: data.status,
        services: data.services,
        response_time_ms: data.response_time.unwrap_or(measured_ms),
        server: data.server,
    })
}
