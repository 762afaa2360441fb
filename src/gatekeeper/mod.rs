//! The gatekeeper pipeline: every inbound request is classified, rate
//! limited, authenticated and authorized here before any handler runs.
//!
//! Terminal branches per request: bypassed, rate-limited (429), redirected
//! to a login page, or forwarded with identity headers attached. The fixed
//! security header set decorates every one of them, denials included.

use crate::error::Result;
use crate::headers::SecurityHeaders;
use crate::metrics;
use crate::rate_limit::{client_identity, RateLimitDecision, RateLimiterSet};
use crate::routes::{RouteClass, RoutePolicy};
use crate::security::{SecurityEventKind, SecurityMonitor, Severity};
use crate::session::{Principal, Role, SessionResolver};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared state for the gatekeeper middleware
#[derive(Clone)]
pub struct GatekeeperState {
    pub policy: Arc<RoutePolicy>,
    pub limiters: Arc<RateLimiterSet>,
    pub monitor: Arc<SecurityMonitor>,
    pub resolver: Arc<dyn SessionResolver>,
    pub headers: Arc<SecurityHeaders>,
}

impl GatekeeperState {
    pub fn new(
        policy: RoutePolicy,
        limiters: RateLimiterSet,
        monitor: SecurityMonitor,
        resolver: Arc<dyn SessionResolver>,
        headers: SecurityHeaders,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            limiters: Arc::new(limiters),
            monitor: Arc::new(monitor),
            resolver,
            headers: Arc::new(headers),
        }
    }
}

/// Outcome of the authentication/authorization steps
enum Admission {
    Forward(Principal),
    Deny(Response),
}

/// Axum middleware implementing the request state machine
pub async fn gatekeeper_middleware(
    State(state): State<GatekeeperState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = state.policy.classify(&path);

    // Bypass prefixes skip both rate limiting and authentication
    if class == RouteClass::AuthExempt {
        debug!(path = %path, "Bypass prefix, forwarding");
        metrics::record_decision("bypassed");
        return state.headers.decorate(next.run(request).await);
    }

    if let Some(limiter_class) = state.policy.limiter_class(&path) {
        let identity = client_identity(request.headers());
        let decision = state.limiters.for_class(limiter_class).check(&identity).await;

        if !decision.allowed {
            state
                .monitor
                .record(
                    SecurityEventKind::RateLimit,
                    &path,
                    request.headers(),
                    json!({
                        "path": path,
                        "retryAfter": decision.retry_after_secs,
                    }),
                    Severity::Medium,
                )
                .await;
            metrics::record_rate_limit_exceeded(limiter_class.as_str());
            metrics::record_decision("rate_limited");
            return state.headers.decorate(too_many_requests(&decision));
        }
    }

    if !class.requires_auth() {
        metrics::record_decision("forwarded");
        return state.headers.decorate(next.run(request).await);
    }

    match admit(&state, &path, class, request.headers()).await {
        Ok(Admission::Forward(principal)) => {
            let mut request = request;
            attach_identity(&mut request, &principal);
            metrics::record_decision("forwarded");
            state.headers.decorate(next.run(request).await)
        }
        Ok(Admission::Deny(response)) => state.headers.decorate(response),
        Err(e) => {
            // Nothing escapes as a raw server error; the failure is logged
            // here and the caller only sees a login redirect.
            error!(path = %path, error = %e, "Gatekeeper pipeline failure");
            metrics::record_decision("error");
            state
                .headers
                .decorate(redirect_with_error(state.policy.login_path(), "auth_error"))
        }
    }
}

/// Resolve the session and check it against the route class
async fn admit(
    state: &GatekeeperState,
    path: &str,
    class: RouteClass,
    headers: &HeaderMap,
) -> Result<Admission> {
    let principal = match state.resolver.resolve(headers).await? {
        Some(principal) => principal,
        None => {
            state
                .monitor
                .record(
                    SecurityEventKind::AuthFailure,
                    path,
                    headers,
                    json!({
                        "path": path,
                        "reason": "no_session",
                    }),
                    Severity::Medium,
                )
                .await;
            metrics::record_auth_failure("no_session");
            metrics::record_decision("unauthenticated");

            let login = state.policy.login_path_for(class);
            return Ok(Admission::Deny(redirect_with_callback(login, path)));
        }
    };

    let required = match class {
        RouteClass::AdminOnly => Some(Role::Admin),
        RouteClass::BuyerOnly => Some(Role::Buyer),
        _ => None,
    };

    if let Some(required) = required {
        if principal.role != required {
            state
                .monitor
                .record(
                    SecurityEventKind::AuthFailure,
                    path,
                    headers,
                    json!({
                        "path": path,
                        "reason": "insufficient_permissions",
                        "requiredRole": required.to_string(),
                        "userRole": principal.role.to_string(),
                    }),
                    Severity::High,
                )
                .await;
            metrics::record_auth_failure("insufficient_permissions");
            metrics::record_decision("unauthorized");

            let login = state.policy.login_path_for(class);
            let flag = match required {
                Role::Admin => "admin_required",
                _ => "buyer_required",
            };
            return Ok(Admission::Deny(redirect_with_error(login, flag)));
        }
    }

    Ok(Admission::Forward(principal))
}

/// Attach identity headers for downstream consumers
fn attach_identity(request: &mut Request, principal: &Principal) {
    let headers = request.headers_mut();
    headers.insert(
        "x-user-role",
        HeaderValue::from_static(principal.role.forwarded_value()),
    );
    if let Ok(value) = HeaderValue::from_str(&principal.id) {
        headers.insert("x-user-id", value);
    }
}

/// Build a 429 response with retry metadata headers
fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs.unwrap_or(0);

    let body = json!({
        "error": "Too many requests",
        "retryAfter": retry_after,
    });

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(
        "Retry-After",
        HeaderValue::from_str(&retry_after.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&decision.limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&decision.remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&decision.reset_at_ms.to_string()).unwrap(),
    );

    response
}

/// Redirect to a login page preserving the original path as a callback
fn redirect_with_callback(login_path: &str, original_path: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", original_path)
        .finish();
    redirect(format!("{}?{}", login_path, query))
}

/// Redirect to a login page with an error flag
fn redirect_with_error(login_path: &str, error: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", error)
        .finish();
    redirect(format!("{}?{}", login_path, query))
}

fn redirect(location: String) -> Response {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_requests_response() {
        let decision = RateLimitDecision::denied(100, 90_000, 30);
        let response = too_many_requests(&decision);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("Retry-After").unwrap(), "30");
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "100");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "90000");
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_redirect_with_callback_encodes_path() {
        let response = redirect_with_callback("/login/admin", "/api/admin/users");

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login/admin?callbackUrl=%2Fapi%2Fadmin%2Fusers"
        );
    }

    #[test]
    fn test_redirect_with_error_flag() {
        let response = redirect_with_error("/login/buyer", "buyer_required");

        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login/buyer?error=buyer_required"
        );
    }

    #[test]
    fn test_attach_identity_headers() {
        let mut request = Request::new(Body::empty());
        let principal = Principal {
            id: "user-42".to_string(),
            role: Role::Buyer,
        };

        attach_identity(&mut request, &principal);

        assert_eq!(request.headers().get("x-user-role").unwrap(), "BUYER");
        assert_eq!(request.headers().get("x-user-id").unwrap(), "user-42");
    }

    #[test]
    fn test_attach_identity_unknown_role_forwards_empty() {
        let mut request = Request::new(Body::empty());
        let principal = Principal {
            id: "user-42".to_string(),
            role: Role::Unknown,
        };

        attach_identity(&mut request, &principal);

        assert_eq!(request.headers().get("x-user-role").unwrap(), "");
    }
}
