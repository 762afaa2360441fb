//! Rate limiting module
//!
//! Fixed-window rate limiting with one independently configured limiter per
//! route class (`auth`, `admin`, `api`). Windows live in an injected store:
//!
//! - **In-memory**: DashMap-backed, single process
//! - **Redis**: atomic Lua script, shared across gatekeeper instances
//!
//! # Features
//!
//! - Client identity from `x-forwarded-for` / `x-real-ip` with a shared
//!   fallback bucket
//! - Retry metadata for 429 responses (`Retry-After`, `X-RateLimit-*`)
//! - Best-effort semantics: store failure admits the request
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper::rate_limit::{InMemoryStore, LimiterClass, RateLimitConfig, RateLimiter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::new(
//!         LimiterClass::Auth,
//!         RateLimitConfig { limit: 5, window_ms: 60_000 },
//!         Arc::new(InMemoryStore::new()),
//!     );
//!
//!     let decision = limiter.check("203.0.113.7").await;
//!     assert!(decision.allowed);
//! }
//! ```

pub mod limiter;
pub mod redis;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use limiter::{client_identity, RateLimiter, RateLimiterSet, UNKNOWN_IDENTITY};
pub use redis::RedisStore;
pub use store::{InMemoryStore, RateLimitStore, WindowSnapshot};
pub use types::{LimiterClass, RateLimitConfig, RateLimitDecision, RateLimitKey};
