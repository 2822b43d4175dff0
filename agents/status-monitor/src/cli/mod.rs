//! CLI module for the AI Status Monitor
//!
//! One-off checks, continuous watching, the HTTP server and single AI
//! requests, all driven by the same configuration.

pub mod commands;
pub mod output;

pub use commands::run;
pub use output::{render_status, OutputFormat};

use aarambh_status::{HealthStatus, ProbeConfig, StatusConfig, StatusError};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "status-monitor")]
#[command(about = "AI Status Monitor - AARAMBH AI backend health polling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every probe once and print the aggregate
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Poll continuously and print each new status until Ctrl-C
    Watch {
        #[command(flatten)]
        config: ConfigArgs,

        /// Override the poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Start polling and serve the status over HTTP
    Serve {
        #[command(flatten)]
        config: ConfigArgs,

        /// Port to listen on
        #[arg(short, long, default_value = "8083", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Send one AI request and print the response
    Ask {
        #[command(flatten)]
        config: ConfigArgs,

        /// `tutor`, `request` or a path under the AI base URL
        #[arg(short, long, default_value = "tutor")]
        endpoint: String,

        /// Prompt text
        #[arg(short = 'q', long)]
        prompt: String,

        /// Agent type forwarded to the backend
        #[arg(long)]
        agent_type: Option<String>,
    },
}

/// Configuration sources shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, env = "AARAMBH_STATUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// AI backend base URL
    #[arg(long, env = "AARAMBH_AI_BASE_URL")]
    pub ai_base_url: Option<String>,

    /// Health probe as NAME=URL (repeatable, replaces configured probes)
    #[arg(long = "probe", value_name = "NAME=URL")]
    pub probes: Vec<ProbeConfig>,

    /// Per-attempt request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl ConfigArgs {
    /// File (or defaults) with command-line overrides applied
    pub fn resolve(&self) -> Result<StatusConfig, StatusError> {
        let mut config = match &self.config {
            Some(path) => StatusConfig::load(path)?,
            None => StatusConfig::default(),
        };

        if let Some(url) = &self.ai_base_url {
            config.ai_base_url = url.clone();
        }
        if !self.probes.is_empty() {
            config.probes = self.probes.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Healthy or degraded
    Success = 0,
    /// AI services unavailable
    Unhealthy = 1,
    /// Invalid configuration or arguments
    InvalidInput = 3,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    pub fn from_status(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy | HealthStatus::Degraded => ExitCode::Success,
            _ => ExitCode::Unhealthy,
        }
    }
}
