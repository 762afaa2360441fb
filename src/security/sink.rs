use super::SecurityEvent;
use crate::error::{GatekeeperError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Destination for security events forwarded out of process.
///
/// Delivery is best-effort: callers swallow errors, so implementations
/// should fail fast rather than retry.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &SecurityEvent) -> Result<()>;
}

/// Posts events as JSON to a webhook endpoint
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        // Short timeout: event delivery rides on the request path
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();

        Self { client, url }
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    async fn deliver(&self, event: &SecurityEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| GatekeeperError::Internal(format!("Sink request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatekeeperError::Internal(format!(
                "Sink returned status {}",
                status
            )));
        }

        debug!(event_id = %event.id, "Security event delivered to sink");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{SecurityEventKind, Severity};
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> SecurityEvent {
        SecurityEvent {
            id: Uuid::new_v4(),
            kind: SecurityEventKind::AuthFailure,
            path: "/admin".to_string(),
            severity: Severity::High,
            timestamp_ms: 1_000,
            client: "deadbeef".to_string(),
            user_agent: Some("test-agent".to_string()),
            details: json!({"reason": "insufficient_permissions"}),
        }
    }

    #[tokio::test]
    async fn test_webhook_sink_posts_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(format!("{}/events", server.uri()));
        assert!(sink.deliver(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_sink_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri());
        assert!(sink.deliver(&event()).await.is_err());
    }

    #[tokio::test]
    async fn test_webhook_sink_unreachable_is_an_error() {
        let sink = WebhookSink::new("http://127.0.0.1:1/events".to_string());
        assert!(sink.deliver(&event()).await.is_err());
    }
}
