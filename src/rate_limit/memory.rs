//! In-memory rate limit store for single-process operation.
//!
//! Lock-based store keyed by platform. State is not shared with other
//! processes and is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::backend::{next_slot, prune_window, RateLimitResult, RateLimitStore};
use super::config::RateLimitRule;

/// In-memory sliding-window store.
#[derive(Clone, Default)]
pub struct InMemoryRateLimitStore {
    windows: Arc<Mutex<HashMap<String, Vec<i64>>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with recorded requests.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn reserve_slot(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now_ms: i64,
    ) -> RateLimitResult<Duration> {
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key.to_string()).or_default();

        prune_window(timestamps, rule.window_ms(), now_ms);
        let slot = next_slot(timestamps, rule, now_ms);
        timestamps.push(slot);
        timestamps.sort_unstable();

        Ok(Duration::from_millis((slot - now_ms).max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_reservations_are_free() {
        let store = InMemoryRateLimitStore::new();
        let rule = RateLimitRule::new(2, 60.0);

        let wait = store.reserve_slot("rate_limit_x", &rule, 1_000).await.unwrap();
        assert_eq!(wait, Duration::ZERO);
        let wait = store.reserve_slot("rate_limit_x", &rule, 1_001).await.unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_reservation_waits_at_ceiling() {
        let store = InMemoryRateLimitStore::new();
        let rule = RateLimitRule::new(2, 1.0);

        store.reserve_slot("k", &rule, 0).await.unwrap();
        store.reserve_slot("k", &rule, 100).await.unwrap();
        let wait = store.reserve_slot("k", &rule, 200).await.unwrap();

        // Oldest entry (0) leaves the window at 1000.
        assert_eq!(wait, Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_expired_entries_free_their_slot() {
        let store = InMemoryRateLimitStore::new();
        let rule = RateLimitRule::new(2, 1.0);

        store.reserve_slot("k", &rule, 0).await.unwrap();
        store.reserve_slot("k", &rule, 900).await.unwrap();

        // Entry 0 has left the window by 1500, leaving room for one more.
        let wait = store.reserve_slot("k", &rule, 1_500).await.unwrap();
        assert_eq!(wait, Duration::ZERO);
        // 900 and 1500 now fill the window; 900 expires at 1900.
        let wait = store.reserve_slot("k", &rule, 1_600).await.unwrap();
        assert_eq!(wait, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemoryRateLimitStore::new();
        let rule = RateLimitRule::new(1, 60.0);

        store.reserve_slot("rate_limit_a", &rule, 0).await.unwrap();
        let wait = store.reserve_slot("rate_limit_b", &rule, 0).await.unwrap();
        assert_eq!(wait, Duration::ZERO);
        assert_eq!(store.tracked_keys().await, 2);
    }
}
