//! Request pacing: per-instance randomized delay and per-platform sliding window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{rate_limit_key, RateLimitStore};
use super::config::{default_rules, DelayRange, RateLimitRule, ESCALATION_INTERVAL};
use super::memory::InMemoryRateLimitStore;

/// Sliding-window limiter shared by every client of a platform.
///
/// Store failures never block scraping: they are logged and the request
/// proceeds unthrottled.
#[derive(Clone)]
pub struct RateGovernor {
    store: Arc<dyn RateLimitStore>,
    rules: HashMap<String, RateLimitRule>,
}

impl RateGovernor {
    pub fn new(store: Arc<dyn RateLimitStore>, rules: HashMap<String, RateLimitRule>) -> Self {
        Self { store, rules }
    }

    /// Process-local governor with the built-in rule table.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), default_rules())
    }

    /// Replace or add the rule for one platform.
    pub fn with_rule(mut self, platform: &str, rule: RateLimitRule) -> Self {
        self.rules.insert(platform.to_string(), rule);
        self
    }

    pub fn rule_for(&self, platform: &str) -> Option<&RateLimitRule> {
        self.rules.get(platform)
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Wait until `platform` is under its ceiling, then record the request.
    ///
    /// Returns how long the call slept. Platforms without a rule are not
    /// throttled.
    pub async fn respect_rate_limit(&self, platform: &str) -> Duration {
        let Some(rule) = self.rules.get(platform) else {
            debug!(platform, "No rate limit rule configured");
            return Duration::ZERO;
        };

        let key = rate_limit_key(platform);
        let now_ms = chrono::Utc::now().timestamp_millis();

        match self.store.reserve_slot(&key, rule, now_ms).await {
            Ok(wait) if wait.is_zero() => wait,
            Ok(wait) => {
                info!(
                    platform,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit reached, waiting"
                );
                tokio::time::sleep(wait).await;
                wait
            }
            Err(e) => {
                warn!(platform, error = %e, "Rate limit store unavailable, proceeding");
                Duration::ZERO
            }
        }
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Per-instance spacing between consecutive requests.
///
/// The last-request lock is held across the sleep, so concurrent callers on
/// one instance are serialized and each observes the full spacing.
pub struct DelayGovernor {
    range: StdMutex<DelayRange>,
    last_request: Mutex<Option<Instant>>,
    successes: AtomicU64,
}

impl DelayGovernor {
    pub fn new(range: DelayRange) -> Self {
        Self {
            range: StdMutex::new(range),
            last_request: Mutex::new(None),
            successes: AtomicU64::new(0),
        }
    }

    pub fn delay_range(&self) -> DelayRange {
        *self.range.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_delay_range(&self, min_secs: f64, max_secs: f64) {
        *self.range.lock().unwrap_or_else(PoisonError::into_inner) =
            DelayRange::new(min_secs, max_secs);
    }

    fn sample_delay(&self) -> Duration {
        let range = self.delay_range();
        let secs = if range.max_secs > range.min_secs {
            rand::thread_rng().gen_range(range.min_secs..=range.max_secs)
        } else {
            range.min_secs
        };
        Duration::from_secs_f64(secs)
    }

    /// Sleep until a randomized delay in the configured range has passed
    /// since the previous request, then stamp this one.
    ///
    /// The first call on an instance never waits. Returns the time slept.
    pub async fn enforce_delay(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            let required = self.sample_delay();
            if elapsed < required {
                waited = required - elapsed;
                debug!(wait_ms = waited.as_millis() as u64, "Enforcing request delay");
                tokio::time::sleep(waited).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }

    /// Count a successful scrape. Every tenth success widens the delay range.
    ///
    /// Returns true when the range was escalated.
    pub fn record_success(&self) -> bool {
        let count = self.successes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % ESCALATION_INTERVAL != 0 {
            return false;
        }

        let mut range = self.range.lock().unwrap_or_else(PoisonError::into_inner);
        let next = range.escalated();
        if next != *range {
            info!(
                min_delay = next.min_secs,
                max_delay = next.max_secs,
                successes = count,
                "Increasing request delay"
            );
            *range = next;
        }
        true
    }

    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }
}

impl Default for DelayGovernor {
    fn default() -> Self {
        Self::new(DelayRange::default())
    }
}
