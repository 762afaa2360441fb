use axum::http::{HeaderName, HeaderValue, Response};
use tracing::warn;

/// Default Content-Security-Policy: self plus the explicitly allowed
/// exceptions the storefront needs (inline styles, data URIs, https images)
pub const DEFAULT_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-eval' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self' data:; connect-src 'self' https:; frame-ancestors 'none';";

const FIXED_HEADERS: [(&str, &str); 9] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-xss-protection", "1; mode=block"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-robots-tag", "noindex, nofollow"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
];

/// Immutable set of security headers applied to every outbound response,
/// denials included.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn new() -> Self {
        Self::with_csp(DEFAULT_CSP)
    }

    /// Build the set with a custom Content-Security-Policy. An unparseable
    /// policy falls back to the default rather than shipping without one.
    pub fn with_csp(csp: &str) -> Self {
        let mut headers: Vec<(HeaderName, HeaderValue)> = FIXED_HEADERS
            .iter()
            .map(|(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();

        let csp_value = HeaderValue::from_str(csp).unwrap_or_else(|_| {
            warn!("Invalid content_security_policy override, using default");
            HeaderValue::from_static(DEFAULT_CSP)
        });
        headers.push((HeaderName::from_static("content-security-policy"), csp_value));

        Self { headers }
    }

    pub fn from_config(csp_override: Option<&str>) -> Self {
        match csp_override {
            Some(csp) => Self::with_csp(csp),
            None => Self::new(),
        }
    }

    /// Apply the fixed set to a response, returning the decorated response.
    /// Existing headers with the same names are replaced.
    pub fn decorate<B>(&self, mut response: Response<B>) -> Response<B> {
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        response
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new()
    }
}
