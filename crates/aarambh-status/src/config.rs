//! Configuration for AI status monitoring
//!
//! Loaded from TOML, YAML or JSON (by file extension). Every field has a
//! default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::AiClient;
use crate::client::{HttpTransport, RetryPolicy, RetryingClient};
use crate::clock::Clock;
use crate::engine::{HealthMonitor, HealthProbe, HttpHealthProbe, HEALTH_PATH};
use crate::error::{Result, StatusError};
use crate::service::StatusService;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Base URL of the AI backend
    #[serde(default = "default_ai_base_url")]
    pub ai_base_url: String,

    /// Health endpoints to poll; empty means `<ai_base_url>/api/ai/health`
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,

    /// Seconds between polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-attempt request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts per health probe
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Retry policy for AI requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// AI response cache
    #[serde(default)]
    pub cache: CacheConfig,
}

/// A named health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    pub url: String,
}

impl std::str::FromStr for ProbeConfig {
    type Err = StatusError;

    /// Parse `NAME=URL`, or a bare URL named after its host
    fn from_str(s: &str) -> Result<Self> {
        let named = s.split_once('=').filter(|(name, _)| !name.contains("://"));
        let (name, url) = match named {
            Some((name, url)) => (name.trim().to_string(), url.trim().to_string()),
            None => {
                let host = s
                    .split("://")
                    .nth(1)
                    .unwrap_or(s)
                    .split(['/', ':'])
                    .next()
                    .unwrap_or(s);
                (host.to_string(), s.trim().to_string())
            }
        };

        if name.is_empty() || url.is_empty() {
            return Err(StatusError::config(format!("Invalid probe '{}', expected NAME=URL", s)));
        }
        Ok(Self { name, url })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ai_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_probe_attempts() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            ai_base_url: default_ai_base_url(),
            probes: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            probe_attempts: default_probe_attempts(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl StatusConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: StatusConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StatusError::config(format!("JSON error: {}", e)))?,
            Some("toml") | None => toml::from_str(&content)?,
            Some(other) => {
                return Err(StatusError::config(format!(
                    "Unsupported config format '.{}'",
                    other
                )))
            }
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), probes = config.probes.len(), "Loaded status config");
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ai_base_url.trim().is_empty() {
            return Err(StatusError::config("ai_base_url must not be empty"));
        }
        if self.poll_interval_secs == 0 {
            return Err(StatusError::config("poll_interval_secs must be greater than 0"));
        }
        if self.request_timeout_ms == 0 {
            return Err(StatusError::config("request_timeout_ms must be greater than 0"));
        }
        if self.probe_attempts == 0 || self.retry.max_attempts == 0 {
            return Err(StatusError::config("attempt counts must be at least 1"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(StatusError::config("retry.max_delay_ms must be >= retry.base_delay_ms"));
        }
        if self.cache.capacity == 0 {
            return Err(StatusError::config("cache.capacity must be at least 1"));
        }
        for probe in &self.probes {
            if !probe.url.starts_with("http://") && !probe.url.starts_with("https://") {
                return Err(StatusError::config(format!(
                    "Probe '{}' has a non-HTTP url '{}'",
                    probe.name, probe.url
                )));
            }
        }
        Ok(())
    }

    /// Configured probes, or the default one on the AI base URL
    pub fn effective_probes(&self) -> Vec<ProbeConfig> {
        if self.probes.is_empty() {
            vec![ProbeConfig {
                name: "ai-backend".to_string(),
                url: format!("{}{}", self.ai_base_url.trim_end_matches('/'), HEALTH_PATH),
            }]
        } else {
            self.probes.clone()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Health monitor over the effective probes
    pub fn build_monitor(
        &self,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> HealthMonitor {
        let client = RetryingClient::new(transport, Arc::clone(&clock))
            .with_timeout(self.request_timeout())
            .with_policy(RetryPolicy {
                max_attempts: self.probe_attempts,
                ..self.retry.policy()
            });

        let probes = self
            .effective_probes()
            .into_iter()
            .map(|p| Arc::new(HttpHealthProbe::new(p.name, p.url, client.clone())) as Arc<dyn HealthProbe>)
            .collect();

        HealthMonitor::new(probes, clock)
    }

    /// Polling service, not yet started
    pub fn build_service(
        &self,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> StatusService {
        let monitor = Arc::new(self.build_monitor(transport, Arc::clone(&clock)));
        StatusService::new(monitor, clock, self.poll_interval())
    }

    /// Cached AI request client
    pub fn build_ai_client(&self, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> AiClient {
        let client = RetryingClient::new(transport, clock)
            .with_timeout(self.request_timeout())
            .with_policy(self.retry.policy());

        AiClient::new(
            self.ai_base_url.clone(),
            client,
            self.cache.capacity,
            Duration::from_secs(self.cache.default_ttl_secs),
        )
    }
}
