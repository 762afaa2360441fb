use super::store::RateLimitStore;
use super::types::{LimiterClass, RateLimitConfig, RateLimitDecision, RateLimitKey};
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Bucket used when a request carries neither forwarded-for nor real-ip
/// headers. Documented weakness: all such clients share one window.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Extract the client identity from proxy headers: first `x-forwarded-for`
/// entry, then `x-real-ip`, then the shared unknown bucket.
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    UNKNOWN_IDENTITY.to_string()
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fixed-window rate limiter for one limiter class
pub struct RateLimiter {
    class: LimiterClass,
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(class: LimiterClass, config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            class,
            config,
            store,
        }
    }

    /// Check whether a request from `identity` is allowed right now
    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, epoch_ms()).await
    }

    /// Check against an explicit clock. The window is incremented as a side
    /// effect; denial means the incremented count exceeded the limit.
    pub async fn check_at(&self, identity: &str, now_ms: u64) -> RateLimitDecision {
        let key = RateLimitKey::new(self.class, identity).storage_key();

        let snapshot = match self.store.incr(&key, self.config.window_ms, now_ms).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Limiting is best-effort: an unavailable store admits the
                // request rather than turning into an outage.
                warn!("Rate limit store unavailable, admitting request: {}", e);
                return RateLimitDecision::allowed(
                    self.config.limit,
                    self.config.limit.saturating_sub(1),
                    now_ms + self.config.window_ms,
                );
            }
        };

        if snapshot.count > self.config.limit {
            let retry_after_secs = (snapshot.reset_at_ms.saturating_sub(now_ms) + 999) / 1000;
            warn!(
                "Rate limit exceeded for key {}: count={}, limit={}",
                key, snapshot.count, self.config.limit
            );
            RateLimitDecision::denied(self.config.limit, snapshot.reset_at_ms, retry_after_secs.max(1))
        } else {
            debug!(
                "Rate limit check passed for key {}: count={}, limit={}",
                key, snapshot.count, self.config.limit
            );
            RateLimitDecision::allowed(
                self.config.limit,
                self.config.limit - snapshot.count,
                snapshot.reset_at_ms,
            )
        }
    }

    pub fn class(&self) -> LimiterClass {
        self.class
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// The three independently configured limiters, sharing one store
pub struct RateLimiterSet {
    auth: RateLimiter,
    admin: RateLimiter,
    api: RateLimiter,
}

impl RateLimiterSet {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        auth: RateLimitConfig,
        admin: RateLimitConfig,
        api: RateLimitConfig,
    ) -> Self {
        Self {
            auth: RateLimiter::new(LimiterClass::Auth, auth, store.clone()),
            admin: RateLimiter::new(LimiterClass::Admin, admin, store.clone()),
            api: RateLimiter::new(LimiterClass::Api, api, store),
        }
    }

    pub fn for_class(&self, class: LimiterClass) -> &RateLimiter {
        match class {
            LimiterClass::Auth => &self.auth,
            LimiterClass::Admin => &self.admin,
            LimiterClass::Api => &self.api,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::InMemoryStore;
    use axum::http::HeaderValue;

    fn limiter(limit: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(
            LimiterClass::Auth,
            RateLimitConfig { limit, window_ms },
            Arc::new(InMemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn test_fresh_key_allows_with_full_remaining() {
        let limiter = limiter(10, 60_000);

        let decision = limiter.check_at("10.0.0.1", 0).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.reset_at_ms, 60_000);
    }

    #[tokio::test]
    async fn test_five_per_minute_scenario() {
        let limiter = limiter(5, 60_000);

        for expected_remaining in [4u32, 3, 2, 1, 0] {
            let decision = limiter.check_at("10.0.0.1", 1_000).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check_at("10.0.0.1", 1_000).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after_secs, Some(60));
    }

    #[tokio::test]
    async fn test_window_elapse_resets_count() {
        let limiter = limiter(2, 60_000);

        assert!(limiter.check_at("10.0.0.1", 0).await.allowed);
        assert!(limiter.check_at("10.0.0.1", 0).await.allowed);
        assert!(!limiter.check_at("10.0.0.1", 0).await.allowed);

        // A full window later the count restarts at 1
        let decision = limiter.check_at("10.0.0.1", 60_000).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn test_retry_after_shrinks_with_elapsed_time() {
        let limiter = limiter(1, 60_000);

        assert!(limiter.check_at("10.0.0.1", 0).await.allowed);

        let decision = limiter.check_at("10.0.0.1", 30_000).await;
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, Some(30));
    }

    #[tokio::test]
    async fn test_identities_do_not_share_windows() {
        let limiter = limiter(1, 60_000);

        assert!(limiter.check_at("10.0.0.1", 0).await.allowed);
        assert!(!limiter.check_at("10.0.0.1", 0).await.allowed);
        assert!(limiter.check_at("10.0.0.2", 0).await.allowed);
    }

    #[tokio::test]
    async fn test_limiter_set_classes_are_independent() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryStore::new());
        let set = RateLimiterSet::new(
            store,
            RateLimitConfig { limit: 1, window_ms: 60_000 },
            RateLimitConfig { limit: 1, window_ms: 60_000 },
            RateLimitConfig { limit: 1, window_ms: 60_000 },
        );

        assert!(set.for_class(LimiterClass::Auth).check_at("ip", 0).await.allowed);
        assert!(!set.for_class(LimiterClass::Auth).check_at("ip", 0).await.allowed);

        // Same identity, different class, fresh window
        assert!(set.for_class(LimiterClass::Api).check_at("ip", 0).await.allowed);
    }

    #[test]
    fn test_client_identity_forwarded_for_first_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1, 10.0.0.2"),
        );
        assert_eq!(client_identity(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_identity_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_identity(&headers), "198.51.100.4");
    }

    #[test]
    fn test_client_identity_unknown_bucket() {
        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), UNKNOWN_IDENTITY);
    }
}
