//! Pluggable backend trait for the shared rate-limit window store.
//!
//! Allows swapping between in-memory (single process) and Redis
//! (cross-process, globally consistent per platform key).

use std::time::Duration;

use async_trait::async_trait;

use super::config::RateLimitRule;

/// Result type for rate limit operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Errors from rate limit backend operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Cache key holding a platform's request timestamps.
pub fn rate_limit_key(platform: &str) -> String {
    format!("rate_limit_{}", platform)
}

/// Trait for rate limit storage backends.
///
/// Implementations must make `reserve_slot` atomic: prune, check, append and
/// write back happen as one step so concurrent workers cannot both see room
/// under the ceiling.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Reserve the next request slot for `key` under `rule`.
    ///
    /// Returns how long the caller must wait before firing (zero if it may
    /// fire now). The reserved timestamp is recorded before returning.
    async fn reserve_slot(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now_ms: i64,
    ) -> RateLimitResult<Duration>;
}

/// Drop timestamps that have left the window ending at `now_ms`.
pub fn prune_window(timestamps: &mut Vec<i64>, window_ms: i64, now_ms: i64) {
    timestamps.retain(|t| now_ms - *t < window_ms);
}

/// Compute the timestamp at which the next request may fire.
///
/// `timestamps` must be pruned and sorted ascending. Reserved slots may lie in
/// the future. With `n` entries and a ceiling of `k`, the new request has to
/// wait until entry `n - k` leaves the window.
pub fn next_slot(timestamps: &[i64], rule: &RateLimitRule, now_ms: i64) -> i64 {
    let ceiling = rule.requests.max(1);
    if timestamps.len() < ceiling {
        return now_ms;
    }
    let blocking = timestamps[timestamps.len() - ceiling];
    (blocking + rule.window_ms()).max(now_ms)
}
