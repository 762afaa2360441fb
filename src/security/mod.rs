pub mod sink;

use crate::config::SecurityConfig;
use crate::rate_limit::client_identity;
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use sink::{EventSink, WebhookSink};

/// What triggered a security event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    RateLimit,
    AuthFailure,
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityEventKind::RateLimit => "rate_limit",
            SecurityEventKind::AuthFailure => "auth_failure",
        };
        f.write_str(name)
    }
}

/// Event severity, mapped onto log channels: high to error, medium to
/// warning, low to info
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Structured record of an authentication or rate-limit decision.
/// Append-only: never mutated after emission.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub kind: SecurityEventKind,
    pub path: String,
    pub severity: Severity,
    pub timestamp_ms: u64,
    /// Truncated salted hash of the client identity, never the raw address
    pub client: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub details: Value,
}

/// Emits security events: always one structured log line, plus best-effort
/// delivery to an external sink in production deployments.
pub struct SecurityMonitor {
    production: bool,
    sample_rate: f64,
    log_salt: String,
    sink: Option<Arc<dyn EventSink>>,
}

impl SecurityMonitor {
    /// Create a monitor from configuration, wiring the webhook sink when one
    /// is configured
    pub fn new(config: &SecurityConfig) -> Self {
        let sink: Option<Arc<dyn EventSink>> = config
            .sink_url
            .as_ref()
            .map(|url| Arc::new(WebhookSink::new(url.clone())) as Arc<dyn EventSink>);

        Self {
            production: config.production,
            sample_rate: config.sample_rate,
            log_salt: config.log_salt.clone(),
            sink,
        }
    }

    /// Create a monitor with an explicit sink (for testing)
    pub fn with_sink(config: &SecurityConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            production: config.production,
            sample_rate: config.sample_rate,
            log_salt: config.log_salt.clone(),
            sink: Some(sink),
        }
    }

    /// Record an event. Never fails or delays the request: delivery to the
    /// sink happens on a detached task and errors are swallowed after a
    /// debug log line.
    pub async fn record(
        &self,
        kind: SecurityEventKind,
        path: &str,
        headers: &HeaderMap,
        details: Value,
        severity: Severity,
    ) {
        let event = SecurityEvent {
            id: Uuid::new_v4(),
            kind,
            path: path.to_string(),
            severity,
            timestamp_ms: epoch_ms(),
            client: log_safe_id(&client_identity(headers), &self.log_salt),
            user_agent: headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            details,
        };

        let details_json = event.details.to_string();
        match severity {
            Severity::High => error!(
                kind = %event.kind,
                path = %event.path,
                client = %event.client,
                details = %details_json,
                "Security event"
            ),
            Severity::Medium => warn!(
                kind = %event.kind,
                path = %event.path,
                client = %event.client,
                details = %details_json,
                "Security event"
            ),
            Severity::Low => info!(
                kind = %event.kind,
                path = %event.path,
                client = %event.client,
                details = %details_json,
                "Security event"
            ),
        }

        if !self.production || !self.should_forward(severity) {
            return;
        }

        if let Some(sink) = &self.sink {
            // Delivery runs off the request path: a slow or unreachable sink
            // must not delay the response it is reporting on.
            let sink = sink.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.deliver(&event).await {
                    debug!("Security event sink delivery failed: {}", e);
                }
            });
        }
    }

    /// High severity always forwards; lower severities are sampled
    fn should_forward(&self, severity: Severity) -> bool {
        severity == Severity::High || fastrand::f64() < self.sample_rate
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Truncated, salted hash of an identifier for safe logging. Events carry
/// this instead of raw client addresses.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    hash[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
