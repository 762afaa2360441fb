use crate::error::{GatekeeperError, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::info;

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatekeeperError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "gatekeeper_requests_total",
            "Total number of requests by terminal decision"
        );
        describe_counter!(
            "gatekeeper_rate_limit_exceeded_total",
            "Total number of requests rejected by the rate limiter"
        );
        describe_counter!(
            "gatekeeper_auth_failures_total",
            "Total number of authentication and authorization denials"
        );
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    let metrics = service.render();
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(Body::from(metrics))
        .unwrap_or_default()
}

/// Record a request by its terminal decision
/// (bypassed / forwarded / rate_limited / unauthenticated / unauthorized / error)
pub fn record_decision(decision: &str) {
    let labels = [("decision", decision.to_string())];
    counter!("gatekeeper_requests_total", &labels).increment(1);
}

/// Record a rate limit rejection for a limiter class
pub fn record_rate_limit_exceeded(class: &str) {
    let labels = [("class", class.to_string())];
    counter!("gatekeeper_rate_limit_exceeded_total", &labels).increment(1);
}

/// Record an authentication or authorization denial
pub fn record_auth_failure(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!("gatekeeper_auth_failures_total", &labels).increment(1);
}
