//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record reconcile outcomes

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use super::error::ApiError;
use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const RECONCILIATIONS_TOTAL: &str = "reconciliations_total";
pub const INVITATIONS_DELETED_TOTAL: &str = "invitations_deleted_total";
pub const INVITATIONS_CREATED_TOTAL: &str = "invitations_created_total";

/// Initialize the Prometheus metrics recorder and return a handle for rendering metrics.
///
/// This should be called once during application startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        RECONCILIATIONS_TOTAL,
        "Reconcile runs by outcome (success/dry_run/failed/invalid)"
    );
    describe_counter!(
        INVITATIONS_DELETED_TOTAL,
        "Stale invitations removed, including ones already gone"
    );
    describe_counter!(INVITATIONS_CREATED_TOTAL, "Invitations created");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()).into_response(),
        None => ApiError::service_unavailable("Metrics not initialized").into_response(),
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Record the outcome of one reconcile run.
pub fn record_reconcile(outcome: &'static str) {
    counter!(RECONCILIATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_invitations_deleted(count: usize) {
    counter!(INVITATIONS_DELETED_TOTAL).increment(count as u64);
}

pub fn record_invitation_created() {
    counter!(INVITATIONS_CREATED_TOTAL).increment(1);
}
