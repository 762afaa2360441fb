use super::store::{RateLimitStore, WindowSnapshot};
use crate::error::{GatekeeperError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Script};
use tracing::debug;

/// Lua script for fixed-window rate limiting.
///
/// Runs the whole reset-check-and-increment server-side so concurrent
/// gatekeeper instances sharing the key cannot lose updates.
///
/// KEYS[1] = the window key
/// ARGV[1] = window duration (milliseconds)
///
/// Returns: [count after increment, milliseconds until the window resets]
const FIXED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local window_ms = tonumber(ARGV[1])

-- Increment counter
local current = redis.call('INCR', key)

-- Start the window on first request
if current == 1 then
    redis.call('PEXPIRE', key, window_ms)
end

-- Remaining window from the key's TTL
local ttl = redis.call('PTTL', key)
if ttl < 0 then
    -- No expiry set (key predates the script or persisted), set it now
    redis.call('PEXPIRE', key, window_ms)
    ttl = window_ms
end

return {current, ttl}
"#;

/// Redis-backed fixed-window store for multi-process deployments
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisStore {
    /// Connect to Redis and prepare the window script
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| GatekeeperError::Store(format!("Invalid Redis URL: {}", e)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| GatekeeperError::Store(format!("Redis connection failed: {}", e)))?;

        Ok(Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
        })
    }

    /// Test the Redis connection
    pub async fn ping(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut connection)
            .await
            .map_err(|e| GatekeeperError::Store(format!("Redis ping failed: {}", e)))
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn incr(&self, key: &str, window_ms: u64, now_ms: u64) -> Result<WindowSnapshot> {
        let mut connection = self.connection.clone();

        let result: Vec<i64> = self
            .script
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| GatekeeperError::Store(format!("Window increment failed: {}", e)))?;

        let snapshot = parse_script_reply(&result, now_ms)?;

        debug!(
            "Redis window for key {}: count={}, reset_at_ms={}",
            key, snapshot.count, snapshot.reset_at_ms
        );

        Ok(snapshot)
    }
}

/// Interpret the `[count, ttl_ms]` reply of the window script. Anything
/// else is a store error, not a panic.
fn parse_script_reply(reply: &[i64], now_ms: u64) -> Result<WindowSnapshot> {
    match reply {
        [count, ttl_ms] => Ok(WindowSnapshot {
            count: (*count).max(0) as u32,
            reset_at_ms: now_ms + (*ttl_ms).max(0) as u64,
        }),
        other => Err(GatekeeperError::Store(format!(
            "Unexpected window script reply: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    // These tests require a running Redis instance.
    // They are ignored by default. Run with: cargo test -- --ignored

    const WINDOW_MS: u64 = 60_000;

    #[test]
    fn test_parse_script_reply() {
        let snap = parse_script_reply(&[3, 45_000], 1_000).unwrap();
        assert_eq!(snap.count, 3);
        assert_eq!(snap.reset_at_ms, 46_000);
    }

    #[test]
    fn test_parse_script_reply_clamps_negative_values() {
        let snap = parse_script_reply(&[-1, -2], 1_000).unwrap();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.reset_at_ms, 1_000);
    }

    #[test]
    fn test_parse_script_reply_rejects_wrong_shape() {
        assert!(parse_script_reply(&[], 0).is_err());
        assert!(parse_script_reply(&[1], 0).is_err());
        assert!(parse_script_reply(&[1, 2, 3], 0).is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_fixed_window_counts() {
        let store = RedisStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");

        let key = format!("gatekeeper:test:{}", Uuid::new_v4());

        for expected in 1..=5u32 {
            let snap = store.incr(&key, WINDOW_MS, 0).await.unwrap();
            assert_eq!(snap.count, expected);
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_window_has_expiry() {
        let store = RedisStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");

        let key = format!("gatekeeper:test:{}", Uuid::new_v4());
        let snap = store.incr(&key, WINDOW_MS, 0).await.unwrap();

        assert!(snap.reset_at_ms > 0);
        assert!(snap.reset_at_ms <= WINDOW_MS);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_connection() {
        let store = RedisStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");

        assert!(store.ping().await.is_ok());
    }
}
