//! Retrying HTTP client
//!
//! Issues JSON requests with a per-attempt timeout and retries every failure
//! (transport error, non-2xx, timeout, undecodable body) with exponential
//! backoff: `base_delay * 2^attempt`, attempt counter starting at 1.

mod transport;

pub use transport::*;

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{duration_ms, Clock};
use crate::error::{Result, StatusError};

/// Longest response body kept in an `HttpStatus` error
const MAX_ERROR_BODY: usize = 512;

/// Retry and backoff policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Multiplied by `2^attempt` between attempts
    pub base_delay: Duration,

    /// Upper bound for a single backoff sleep
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// JSON client with timeout, retry and backoff
#[derive(Clone)]
pub struct RetryingClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl RetryingClient {
    /// Create a client with the default policy and a 10 s timeout
    pub fn new(transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Send a request and decode the JSON body, retrying on failure
    pub async fn request(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
        method: Method,
    ) -> Result<serde_json::Value> {
        let request = HttpRequest {
            method,
            url: url.to_string(),
            body,
        };
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&request).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt = attempt, url = %url, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = attempts,
                        method = method.as_str(),
                        url = %url,
                        error = %e,
                        "AI service request failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);

                    if !retryable {
                        break;
                    }
                    if attempt < attempts {
                        let delay = self.policy.delay_for(attempt);
                        tracing::debug!(
                            attempt = attempt,
                            backoff_ms = duration_ms(delay),
                            "Backing off before retry"
                        );
                        self.clock.sleep(delay).await;
                    }
                }
            }
        }

        Err(StatusError::RetriesExhausted {
            attempts,
            last: Box::new(last_error.unwrap_or_else(|| {
                StatusError::Transport("No attempt was made".to_string())
            })),
        })
    }

    /// `request` followed by decoding into `T`
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
        method: Method,
    ) -> Result<T> {
        let value = self.request(url, body, method).await?;
        serde_json::from_value(value).map_err(StatusError::from)
    }

    /// One attempt: timeout, status check, JSON decode
    ///
    /// The timeout runs on the injected clock.
    async fn attempt(&self, request: &HttpRequest) -> Result<serde_json::Value> {
        let response = tokio::select! {
            result = self.transport.send(request.clone()) => result?,
            _ = self.clock.deadline(self.timeout) => {
                return Err(StatusError::Timeout(duration_ms(self.timeout)));
            }
        };

        if !response.is_success() {
            let mut body = response.body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(StatusError::HttpStatus {
                status: response.status,
                body,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&response.body)
            .map_err(|e| StatusError::decode(format!("Invalid JSON body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted outcomes, one per call
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<HttpResponse>>>,
        calls: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: HttpRequest) -> TransportFuture {
            self.calls.lock().unwrap().push(request);
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(StatusError::Transport("script exhausted".to_string())));
            Box::pin(async move { outcome })
        }
    }

    /// Never answers
    struct HangingTransport;

    impl HttpTransport for HangingTransport {
        fn send(&self, _request: HttpRequest) -> TransportFuture {
            Box::pin(std::future::pending::<Result<HttpResponse>>())
        }
    }

    fn ok(body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn refused() -> Result<HttpResponse> {
        Err(StatusError::Transport("ECONNREFUSED".to_string()))
    }

    #[test]
    fn test_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"success":true}"#)]);
        let clock = Arc::new(ManualClock::new());
        let client = RetryingClient::new(transport.clone(), clock.clone());

        let value = client.request("http://ai/api/ai/health", None, Method::Get).await.unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(transport.calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_retries_with_exponential_backoff() {
        let transport = ScriptedTransport::new(vec![
            refused(),
            Ok(HttpResponse {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            ok(r#"{"ok":1}"#),
        ]);
        let clock = Arc::new(ManualClock::new());
        let client = RetryingClient::new(transport.clone(), clock.clone());

        let value = client
            .request("http://ai/api/ai/tutor", Some(serde_json::json!({"prompt": "hi"})), Method::Post)
            .await
            .unwrap();

        assert_eq!(value["ok"], 1);
        assert_eq!(transport.calls(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_terminal_error() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), refused()]);
        let clock = Arc::new(ManualClock::new());
        let client = RetryingClient::new(transport.clone(), clock.clone());

        let err = client.request("http://ai/x", None, Method::Get).await.unwrap_err();

        assert!(matches!(err, StatusError::RetriesExhausted { attempts: 3, .. }));
        assert!(matches!(err.root(), StatusError::Transport(_)));
        assert_eq!(transport.calls(), 3);
        // No sleep after the final attempt
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_retried() {
        let transport = ScriptedTransport::new(vec![ok("<html>"), ok("[1,2]")]);
        let clock = Arc::new(ManualClock::new());
        let client = RetryingClient::new(transport.clone(), clock)
            .with_policy(RetryPolicy {
                max_attempts: 2,
                ..Default::default()
            });

        let value = client.request("http://ai/x", None, Method::Get).await.unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_timeout_follows_injected_clock() {
        let clock = Arc::new(ManualClock::new());
        let client = RetryingClient::new(Arc::new(HangingTransport), clock.clone())
            .with_policy(RetryPolicy::no_retry())
            .with_timeout(Duration::from_millis(250));

        let request =
            tokio::spawn(async move { client.request("http://ai/slow", None, Method::Get).await });

        tokio::task::yield_now().await;
        clock.advance(Duration::from_millis(200));
        tokio::task::yield_now().await;
        assert!(!request.is_finished());

        while !request.is_finished() {
            clock.advance(Duration::from_millis(50));
            tokio::task::yield_now().await;
        }

        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err.root(), StatusError::Timeout(250)));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_system_clock() {
        let client = RetryingClient::new(Arc::new(HangingTransport), Arc::new(SystemClock::new()))
            .with_policy(RetryPolicy::no_retry())
            .with_timeout(Duration::from_millis(250));

        let err = client.request("http://ai/slow", None, Method::Get).await.unwrap_err();
        assert!(matches!(err.root(), StatusError::Timeout(250)));
    }

    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse {
            status: 500,
            body: "x".repeat(4096),
        })]);
        let client = RetryingClient::new(transport, Arc::new(ManualClock::new()))
            .with_policy(RetryPolicy::no_retry());

        let err = client.request("http://ai/x", None, Method::Get).await.unwrap_err();
        match err.root() {
            StatusError::HttpStatus { status, body } => {
                assert_eq!(*status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
