//! Cached AI request client
//!
//! Sends tutor/request calls to the AI backend through the retrying client
//! and keeps successful responses in a [`ResponseCache`] keyed by a signature
//! of the request.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{request_signature, CacheStats, ResponseCache};
use crate::client::{Method, RetryingClient};
use crate::contracts::{AiEndpoint, AiRequest, AiResponse};
use crate::error::{Result, StatusError};

/// AI backend client with a response cache
pub struct AiClient {
    base_url: String,
    client: RetryingClient,
    cache: Mutex<ResponseCache<AiResponse>>,
    ttl: Duration,
}

impl AiClient {
    pub fn new(
        base_url: impl Into<String>,
        client: RetryingClient,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        let cache = ResponseCache::new(capacity, Arc::clone(client.clock()));
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            cache: Mutex::new(cache),
            ttl,
        }
    }

    /// Cache key for a request to `endpoint`
    pub fn cache_key(endpoint: &AiEndpoint, request: &AiRequest) -> Result<String> {
        let path = endpoint.path();
        let metadata = match &request.metadata {
            Some(metadata) => serde_json::to_string(metadata)?,
            None => String::new(),
        };
        Ok(request_signature([
            path.as_str(),
            request.prompt.as_str(),
            request.agent_type.as_deref().unwrap_or(""),
            metadata.as_str(),
        ]))
    }

    /// Send `request`, serving a fresh cached response when available
    pub async fn request(&self, endpoint: AiEndpoint, request: AiRequest) -> Result<AiResponse> {
        let key = Self::cache_key(&endpoint, &request)?;

        let cached = self.lock_cache().get(&key);
        if let Some(cached) = cached {
            tracing::debug!(endpoint = %endpoint.path(), "AI response served from cache");
            return Ok(cached);
        }

        let url = format!("{}{}", self.base_url, endpoint.path());
        let body = serde_json::to_value(&request)?;
        let response: AiResponse = self.client.request_json(&url, Some(body), Method::Post).await?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "backend returned success=false".to_string());
            tracing::warn!(endpoint = %endpoint.path(), reason = %reason, "AI request rejected");
            return Err(StatusError::AiRejected(reason));
        }

        self.lock_cache().set(key, response.clone(), self.ttl);
        Ok(response)
    }

    /// Shorthand for `/api/ai/tutor`
    pub async fn tutor(&self, request: AiRequest) -> Result<AiResponse> {
        self.request(AiEndpoint::Tutor, request).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResponseCache<AiResponse>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
