use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// State of a window immediately after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Request count in the current window, including this request
    pub count: u32,
    /// When the current window resets (epoch milliseconds)
    pub reset_at_ms: u64,
}

/// Backing store for fixed-window counters.
///
/// `incr` must be atomic relative to the expiry check: concurrent calls for
/// the same key may not lose updates or observe a half-reset window. The
/// in-memory store serializes per key; a shared store must perform the
/// reset-and-increment server-side (see `RedisStore`).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Reset the window for `key` if it has expired, then increment it,
    /// returning the post-increment state.
    async fn incr(&self, key: &str, window_ms: u64, now_ms: u64) -> Result<WindowSnapshot>;
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    count: u32,
    window_start_ms: u64,
}

/// In-memory fixed-window store. Suitable for a single process; swap in
/// `RedisStore` when several gatekeeper instances must share windows.
#[derive(Default)]
pub struct InMemoryStore {
    windows: DashMap<String, FixedWindow>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Number of tracked windows (for testing/monitoring)
    pub fn active_windows(&self) -> usize {
        self.windows.len()
    }

    /// Drop all windows (for testing)
    #[cfg(test)]
    pub fn clear(&self) {
        self.windows.clear();
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn incr(&self, key: &str, window_ms: u64, now_ms: u64) -> Result<WindowSnapshot> {
        // The entry guard holds exclusive access to this key for the whole
        // read-modify-write, so the expiry check and increment cannot race.
        let mut window = self.windows.entry(key.to_string()).or_insert_with(|| {
            debug!("Creating new rate limit window for key: {}", key);
            FixedWindow {
                count: 0,
                window_start_ms: now_ms,
            }
        });

        if now_ms.saturating_sub(window.window_start_ms) >= window_ms {
            window.count = 0;
            window.window_start_ms = now_ms;
        }
        window.count += 1;

        Ok(WindowSnapshot {
            count: window.count,
            reset_at_ms: window.window_start_ms + window_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: u64 = 60_000;

    #[tokio::test]
    async fn test_first_increment_starts_window() {
        let store = InMemoryStore::new();

        let snap = store.incr("k1", WINDOW_MS, 1_000).await.unwrap();
        assert_eq!(snap.count, 1);
        assert_eq!(snap.reset_at_ms, 1_000 + WINDOW_MS);
    }

    #[tokio::test]
    async fn test_counts_accumulate_within_window() {
        let store = InMemoryStore::new();

        for expected in 1..=5u32 {
            let snap = store.incr("k1", WINDOW_MS, 1_000).await.unwrap();
            assert_eq!(snap.count, expected);
        }
    }

    #[tokio::test]
    async fn test_expired_window_resets_to_one() {
        let store = InMemoryStore::new();

        for _ in 0..5 {
            store.incr("k1", WINDOW_MS, 1_000).await.unwrap();
        }

        // One millisecond past expiry starts a fresh window
        let snap = store.incr("k1", WINDOW_MS, 1_000 + WINDOW_MS).await.unwrap();
        assert_eq!(snap.count, 1);
        assert_eq!(snap.reset_at_ms, 1_000 + WINDOW_MS + WINDOW_MS);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemoryStore::new();

        store.incr("k1", WINDOW_MS, 1_000).await.unwrap();
        store.incr("k1", WINDOW_MS, 1_000).await.unwrap();
        let snap = store.incr("k2", WINDOW_MS, 1_000).await.unwrap();

        assert_eq!(snap.count, 1);
        assert_eq!(store.active_windows(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();

        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store.incr("shared", WINDOW_MS, 1_000).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snap = store.incr("shared", WINDOW_MS, 1_000).await.unwrap();
        assert_eq!(snap.count, 101);
    }
}
