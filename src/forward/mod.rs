//! Upstream forwarding: requests admitted by the gatekeeper are relayed
//! to the configured upstream application.

use crate::error::{GatekeeperError, Result};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, Response},
    response::IntoResponse,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use std::time::Duration;
use tracing::{debug, warn};

/// Forwarder state shared across requests
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    upstream: String,
}

impl Forwarder {
    pub fn new(upstream: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatekeeperError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstream: upstream.trim_end_matches('/').to_string(),
        })
    }

    fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}{}", self.upstream, path);
        if let Some(q) = query {
            url.push('?');
            url.push_str(q);
        }
        url
    }
}

/// Fallback handler that relays the request to the upstream
pub async fn forward_handler(
    State(forwarder): State<Forwarder>,
    req: Request<Body>,
) -> Result<impl IntoResponse> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let url = forwarder.upstream_url(uri.path(), uri.query());

    debug!(method = %method, url = %url, "Forwarding to upstream");

    let headers = req.headers().clone();
    let body_bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| GatekeeperError::Upstream(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    let response = send_request(&forwarder.client, method, headers, body_bytes, &url).await;

    if let Err(e) = &response {
        warn!(url = %url, error = %e, "Upstream request failed");
    }
    response
}

/// Send a request to the upstream, translating transport failures
async fn send_request(
    client: &reqwest::Client,
    method: Method,
    headers: HeaderMap,
    body_bytes: Bytes,
    url: &str,
) -> Result<Response<Body>> {
    let mut upstream_req = client.request(method, url).body(body_bytes.to_vec());

    // Forward headers (excluding hop-by-hop headers)
    for (name, value) in headers.iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            upstream_req = upstream_req.header(name, value);
        }
    }

    let upstream_response = upstream_req.send().await.map_err(|e| {
        if e.is_timeout() {
            GatekeeperError::Timeout(format!("Upstream request timed out: {}", e))
        } else {
            GatekeeperError::Upstream(format!("Failed to reach upstream: {}", e))
        }
    })?;

    let status = upstream_response.status();
    let mut response_builder = Response::builder().status(status);

    for (name, value) in upstream_response.headers().iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            response_builder = response_builder.header(name, value);
        }
    }

    let body_bytes = upstream_response
        .bytes()
        .await
        .map_err(|e| GatekeeperError::Upstream(format!("Failed to read upstream response: {}", e)))?;

    response_builder
        .body(Body::from(body_bytes))
        .map_err(|e| GatekeeperError::Internal(format!("Failed to build response: {}", e)))
}

/// Check if a header is a hop-by-hop header that should not be forwarded
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop_header("Connection"));
        assert!(is_hop_by_hop_header("connection"));
        assert!(is_hop_by_hop_header("Keep-Alive"));
        assert!(is_hop_by_hop_header("Transfer-Encoding"));
        assert!(!is_hop_by_hop_header("Content-Type"));
        assert!(!is_hop_by_hop_header("Authorization"));
    }

    #[test]
    fn test_upstream_url_building() {
        let forwarder = Forwarder::new("http://localhost:3000/", Duration::from_secs(5)).unwrap();

        assert_eq!(
            forwarder.upstream_url("/api/products", None),
            "http://localhost:3000/api/products"
        );
        assert_eq!(
            forwarder.upstream_url("/api/products", Some("page=2")),
            "http://localhost:3000/api/products?page=2"
        );
    }
}
