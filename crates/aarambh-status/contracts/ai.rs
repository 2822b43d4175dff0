//! AI request and response contracts
//!
//! Shapes of the `POST /api/ai/*` endpoints served by the AARAMBH AI backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AI endpoint addressed by a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AiEndpoint {
    /// `/api/ai/tutor`
    Tutor,
    /// `/api/ai/request`
    Request,
    /// Any other path under the AI base URL
    Custom(String),
}

impl AiEndpoint {
    /// `tutor`, `request` (any case), otherwise a custom path
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "tutor" => AiEndpoint::Tutor,
            "request" => AiEndpoint::Request,
            _ => AiEndpoint::Custom(name.to_string()),
        }
    }

    /// Path relative to the AI base URL
    pub fn path(&self) -> String {
        match self {
            AiEndpoint::Tutor => "/api/ai/tutor".to_string(),
            AiEndpoint::Request => "/api/ai/request".to_string(),
            AiEndpoint::Custom(path) if path.starts_with('/') => path.clone(),
            AiEndpoint::Custom(path) => format!("/{}", path),
        }
    }
}

impl std::str::FromStr for AiEndpoint {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Request body for AI endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl AiRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            agent_type: None,
            metadata: None,
        }
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Response envelope of AI endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AiContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generated content returned by an AI endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiContent {
    pub id: String,

    #[serde(default)]
    pub agent_type: Option<String>,

    #[serde(default)]
    pub provider: Option<String>,

    pub content: String,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default)]
    pub timestamp: Option<String>,
}
