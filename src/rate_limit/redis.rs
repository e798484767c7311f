//! Redis-backed rate limit store for multi-process coordination.
//!
//! Each platform key is a sorted set of reserved request timestamps. The
//! prune-check-append cycle runs inside one Lua script so workers sharing a
//! Redis instance see a globally consistent window.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use super::backend::{RateLimitError, RateLimitResult, RateLimitStore};
use super::config::RateLimitRule;

const RESERVE_SCRIPT: &str = r#"
    local key = KEYS[1]
    local now_ms = tonumber(ARGV[1])
    local window_ms = tonumber(ARGV[2])
    local ceiling = tonumber(ARGV[3])
    local nonce = ARGV[4]

    -- Drop entries that left the window
    redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)

    local count = redis.call('ZCARD', key)
    local slot = now_ms
    if count >= ceiling then
        local blocking = redis.call('ZRANGE', key, count - ceiling, count - ceiling, 'WITHSCORES')
        local candidate = tonumber(blocking[2]) + window_ms
        if candidate > slot then
            slot = candidate
        end
    end

    redis.call('ZADD', key, slot, slot .. ':' .. nonce)
    redis.call('PEXPIRE', key, window_ms + (slot - now_ms))

    return slot - now_ms
"#;

/// Redis-backed sliding-window store.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
}

impl RedisRateLimitStore {
    /// Connect to Redis (e.g. `redis://localhost:6379`).
    pub async fn new(redis_url: &str) -> RateLimitResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RateLimitError::Unavailable(format!("Redis connection error: {}", e)))?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            RateLimitError::Unavailable(format!("Redis connection manager error: {}", e))
        })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn reserve_slot(
        &self,
        key: &str,
        rule: &RateLimitRule,
        now_ms: i64,
    ) -> RateLimitResult<Duration> {
        let mut conn = self.conn.clone();
        let nonce: u64 = rand::random();

        let wait_ms: i64 = Script::new(RESERVE_SCRIPT)
            .key(key)
            .arg(now_ms)
            .arg(rule.window_ms())
            .arg(rule.requests.max(1) as i64)
            .arg(nonce.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        Ok(Duration::from_millis(wait_ms.max(0) as u64))
    }
}
