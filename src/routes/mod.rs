use crate::config::RoutePolicyConfig;
use crate::rate_limit::LimiterClass;

/// Authorization tier a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No authentication required
    Public,
    /// Bypass prefix: exempt from both rate limiting and authentication
    AuthExempt,
    /// Requires an authenticated ADMIN principal
    AdminOnly,
    /// Requires an authenticated BUYER principal
    BuyerOnly,
    /// Requires authentication but no specific role
    Authenticated,
}

impl RouteClass {
    /// Whether a session must be resolved before forwarding
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            RouteClass::AdminOnly | RouteClass::BuyerOnly | RouteClass::Authenticated
        )
    }
}

// Limiter class selection mirrors the API surface, not the auth tiers, so the
// prefixes are fixed rather than configured.
const AUTH_LIMITER_PREFIX: &str = "/api/auth";
const ADMIN_LIMITER_PREFIX: &str = "/api/admin";
const API_LIMITER_PREFIX: &str = "/api";

/// Path-prefix policy that classifies routes and picks login destinations.
/// Pure and stateless: classification is recomputed per request.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    bypass_prefixes: Vec<String>,
    protected_prefixes: Vec<String>,
    admin_only_prefixes: Vec<String>,
    buyer_only_prefixes: Vec<String>,
    login_path: String,
    admin_login_path: String,
    buyer_login_path: String,
}

impl RoutePolicy {
    pub fn new(config: RoutePolicyConfig) -> Self {
        Self {
            bypass_prefixes: config.bypass_prefixes,
            protected_prefixes: config.protected_prefixes,
            admin_only_prefixes: config.admin_only_prefixes,
            buyer_only_prefixes: config.buyer_only_prefixes,
            login_path: config.login_path,
            admin_login_path: config.admin_login_path,
            buyer_login_path: config.buyer_login_path,
        }
    }

    /// Classify a normalized path (no query string) by ordered prefix match:
    /// bypass, then protected membership, then admin-only before buyer-only.
    pub fn classify(&self, path: &str) -> RouteClass {
        if starts_with_any(&self.bypass_prefixes, path) {
            return RouteClass::AuthExempt;
        }

        if !starts_with_any(&self.protected_prefixes, path) {
            return RouteClass::Public;
        }

        if starts_with_any(&self.admin_only_prefixes, path) {
            RouteClass::AdminOnly
        } else if starts_with_any(&self.buyer_only_prefixes, path) {
            RouteClass::BuyerOnly
        } else {
            // Protected but matching neither role set: authentication without
            // a role requirement.
            RouteClass::Authenticated
        }
    }

    /// Select the limiter class for a path, if any applies
    pub fn limiter_class(&self, path: &str) -> Option<LimiterClass> {
        if path.starts_with(AUTH_LIMITER_PREFIX) {
            Some(LimiterClass::Auth)
        } else if path.starts_with(ADMIN_LIMITER_PREFIX) {
            Some(LimiterClass::Admin)
        } else if path.starts_with(API_LIMITER_PREFIX) {
            Some(LimiterClass::Api)
        } else {
            None
        }
    }

    /// Login destination for an unauthenticated request to a route class
    pub fn login_path_for(&self, class: RouteClass) -> &str {
        match class {
            RouteClass::AdminOnly => &self.admin_login_path,
            RouteClass::BuyerOnly => &self.buyer_login_path,
            _ => &self.login_path,
        }
    }

    /// The generic login path, used by the top-level failure handler
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}

fn starts_with_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}
