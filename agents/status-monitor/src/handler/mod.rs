//! HTTP handler for the AI Status Monitor
//!
//! Serves the cached aggregate status; it never probes on read.

use aarambh_status::{HealthData, StatusService, Subscription};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::telemetry::{StatusMetrics, TelemetryError};
use crate::{AGENT_ID, AGENT_VERSION};

/// Application state
pub struct AppState {
    pub service: Arc<StatusService>,
    pub metrics: Arc<StatusMetrics>,
    _metrics_subscription: Subscription,
}

impl AppState {
    /// Wire metrics to `service`; the service is not started here
    pub fn new(service: Arc<StatusService>) -> Result<Self, TelemetryError> {
        let metrics = Arc::new(StatusMetrics::new()?);
        let subscription = metrics.attach(&service);

        Ok(Self {
            service,
            metrics,
            _metrics_subscription: subscription,
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(current_status))
        .route("/api/v1/status/check", post(force_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness of the monitor itself
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: AGENT_ID.to_string(),
        agent_version: AGENT_VERSION.to_string(),
        polling: state.service.is_running(),
    })
}

/// Last published AI status
async fn current_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let data = state.service.current();
    Json(ApiResponse {
        success: data.is_healthy(),
        data,
    })
}

/// Poll now and return the result
async fn force_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let data = state.service.force_check().await;
    Json(ApiResponse {
        success: data.is_healthy(),
        data,
    })
}

/// Prometheus exposition
async fn metrics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    match state.metrics.render() {
        Ok(body) => Ok((
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render metrics");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: "MetricsUnavailable".to_string(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_version: String,
    pub polling: bool,
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// API error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}
