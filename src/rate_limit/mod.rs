//! Rate limiting for marketplace requests.
//!
//! Two layers:
//! - `DelayGovernor` spaces consecutive requests from one client instance.
//! - `RateGovernor` enforces a per-platform sliding window in a shared store.
//!
//! The store is pluggable: in-memory for a single process, Redis (feature
//! `redis-backend`) when several workers scrape the same platform.

pub mod backend;
pub mod config;
pub mod governor;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use backend::{rate_limit_key, RateLimitError, RateLimitResult, RateLimitStore};
pub use config::{default_rules, DelayRange, RateLimitRule};
pub use governor::{DelayGovernor, RateGovernor};
pub use memory::InMemoryRateLimitStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisRateLimitStore;
