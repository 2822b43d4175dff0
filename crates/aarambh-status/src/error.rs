//! Error types for AI status monitoring
//!
//! Transport failures are retried by the client; everything else is surfaced
//! to the caller or folded into an "unavailable" probe outcome.

use thiserror::Error;

/// Main error type for status operations
#[derive(Error, Debug)]
pub enum StatusError {
    /// Connection-level failure (refused, reset, DNS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not finish within its timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Every attempt failed
    #[error("Request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<StatusError>,
    },

    /// Backend answered with `success: false`
    #[error("AI request rejected: {0}")]
    AiRejected(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File access error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatusError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        StatusError::Config(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        StatusError::Decode(msg.into())
    }

    /// Check if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatusError::Transport(_)
                | StatusError::Timeout(_)
                | StatusError::HttpStatus { .. }
                | StatusError::Decode(_)
        )
    }

    /// Check if this is a user-facing error (vs runtime)
    pub fn is_user_error(&self) -> bool {
        matches!(self, StatusError::Config(_) | StatusError::Io(_))
    }

    /// Innermost failure, looking through `RetriesExhausted`
    pub fn root(&self) -> &StatusError {
        match self {
            StatusError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for StatusError {
    fn from(err: serde_json::Error) -> Self {
        StatusError::Decode(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for StatusError {
    fn from(err: serde_yaml::Error) -> Self {
        StatusError::Config(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for StatusError {
    fn from(err: toml::de::Error) -> Self {
        StatusError::Config(format!("TOML error: {}", err))
    }
}

/// Result type alias for status operations
pub type Result<T> = std::result::Result<T, StatusError>;
