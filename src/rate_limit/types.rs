use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Limiter class - which window configuration applies to a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LimiterClass {
    /// Login and credential endpoints (strictest)
    Auth,
    /// Admin API endpoints
    Admin,
    /// General API endpoints
    Api,
}

impl LimiterClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterClass::Auth => "auth",
            LimiterClass::Admin => "admin",
            LimiterClass::Api => "api",
        }
    }
}

impl fmt::Display for LimiterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-window configuration for one limiter class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Rate limit key: client identity scoped to a limiter class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The limiter class the window belongs to
    pub class: LimiterClass,
    /// The client identity (forwarded-for address or the "unknown" bucket)
    pub identity: String,
}

impl RateLimitKey {
    pub fn new(class: LimiterClass, identity: impl Into<String>) -> Self {
        Self {
            class,
            identity: identity.into(),
        }
    }

    /// Render the key for the backing store. The namespace keeps gatekeeper
    /// windows separate from anything else sharing the store.
    pub fn storage_key(&self) -> String {
        format!("gatekeeper:ratelimit:{}:{}", self.class, self.identity)
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Total limit for the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// When the current window resets (epoch milliseconds)
    pub reset_at_ms: u64,
    /// Seconds until the window resets (for 429 responses)
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    /// Create an allowed decision
    pub fn allowed(limit: u32, remaining: u32, reset_at_ms: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at_ms,
            retry_after_secs: None,
        }
    }

    /// Create a denied decision
    pub fn denied(limit: u32, reset_at_ms: u64, retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at_ms,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        let key = RateLimitKey::new(LimiterClass::Api, "192.168.1.1");
        assert_eq!(key.storage_key(), "gatekeeper:ratelimit:api:192.168.1.1");

        let key = RateLimitKey::new(LimiterClass::Auth, "unknown");
        assert_eq!(key.storage_key(), "gatekeeper:ratelimit:auth:unknown");
    }

    #[test]
    fn test_decision_constructors() {
        let allowed = RateLimitDecision::allowed(100, 42, 1_000);
        assert!(allowed.allowed);
        assert_eq!(allowed.remaining, 42);
        assert!(allowed.retry_after_secs.is_none());

        let denied = RateLimitDecision::denied(100, 1_000, 30);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_secs, Some(30));
    }

    #[test]
    fn test_window_duration() {
        let config = RateLimitConfig {
            limit: 5,
            window_ms: 60_000,
        };
        assert_eq!(config.window(), Duration::from_secs(60));
    }
}
