//! AI Status Monitor
//!
//! Polls the AARAMBH AI backends and republishes their aggregated health
//! over a CLI, an HTTP endpoint and Prometheus metrics.

pub mod cli;
pub mod handler;
pub mod telemetry;

pub use cli::{Cli, Commands, ExitCode};
pub use handler::{create_router, AppState};
pub use telemetry::StatusMetrics;

/// Agent version (from Cargo.toml)
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent identifier
pub const AGENT_ID: &str = "ai-status-monitor";
