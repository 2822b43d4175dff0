//! AARAMBH AI Status
//!
//! Availability monitoring for the AI backends of the AARAMBH AI learning
//! platform: health probes, status aggregation, subscriber notification and a
//! cached AI request client.
//!
//! # Components
//! - `client`: JSON client with timeout, retry and exponential backoff
//! - `cache`: TTL response cache with insertion-order eviction
//! - `engine`: health probes, aggregation and the listener registry
//! - `service`: explicitly started and stopped polling loop
//! - `ai`: cached tutor/request calls
//!
//! # Example
//!
//! ```rust,no_run
//! use aarambh_status::{config::StatusConfig, client::ReqwestTransport, clock::SystemClock};
//! use std::sync::Arc;
//!
//! # async fn run() -> aarambh_status::error::Result<()> {
//! let config = StatusConfig::default();
//! let service = config.build_service(Arc::new(ReqwestTransport::new()?), Arc::new(SystemClock::new()));
//!
//! let _subscription = service.subscribe(|status| println!("AI status: {}", status.status));
//! service.start();
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod service;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;

pub use ai::AiClient;
pub use cache::{CacheStats, ResponseCache};
pub use client::{HttpTransport, Method, ReqwestTransport, RetryPolicy, RetryingClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ProbeConfig, StatusConfig};
pub use engine::{HealthMonitor, HealthProbe, HttpHealthProbe, Subscription};
pub use error::{Result, StatusError};
pub use service::StatusService;
