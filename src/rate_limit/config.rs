//! Rate limit rules and delay configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum spacing between requests from one client, in seconds.
pub const DEFAULT_MIN_DELAY_SECS: f64 = 1.0;
/// Default maximum spacing between requests from one client, in seconds.
pub const DEFAULT_MAX_DELAY_SECS: f64 = 3.0;

/// Successful requests between automatic delay increases.
pub const ESCALATION_INTERVAL: u64 = 10;
/// Escalation never pushes the minimum delay past this.
pub const ESCALATION_MIN_CAP_SECS: f64 = 5.0;
/// Escalation never pushes the maximum delay past this.
pub const ESCALATION_MAX_CAP_SECS: f64 = 10.0;

/// Upper bound for any configured delay, in seconds.
pub const MAX_DELAY_SECS: f64 = 3_600.0;
/// Upper bound for a rate-limit window, in seconds.
pub const MAX_WINDOW_SECS: f64 = 86_400.0;

/// Clamp a configured duration into `0..=max`. NaN reads as zero.
fn clamp_secs(secs: f64, max: f64) -> f64 {
    if secs.is_nan() {
        0.0
    } else {
        secs.clamp(0.0, max)
    }
}

/// Sliding-window ceiling for one platform: at most `requests` within `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub requests: usize,
    pub window_secs: f64,
}

impl RateLimitRule {
    pub const fn new(requests: usize, window_secs: f64) -> Self {
        Self {
            requests,
            window_secs,
        }
    }

    /// Window length in milliseconds, clamped to `0..=MAX_WINDOW_SECS`.
    pub fn window_ms(&self) -> i64 {
        (clamp_secs(self.window_secs, MAX_WINDOW_SECS) * 1000.0) as i64
    }
}

/// Built-in per-platform ceilings. Tuned per marketplace; override in config.
pub fn default_rules() -> HashMap<String, RateLimitRule> {
    [
        ("ticketmaster", RateLimitRule::new(5, 60.0)),
        ("stubhub", RateLimitRule::new(10, 60.0)),
        ("seatgeek", RateLimitRule::new(20, 60.0)),
        ("viagogo", RateLimitRule::new(5, 60.0)),
        ("tickpick", RateLimitRule::new(15, 60.0)),
        ("funzone", RateLimitRule::new(10, 60.0)),
    ]
    .into_iter()
    .map(|(name, rule)| (name.to_string(), rule))
    .collect()
}

/// Inclusive range the randomized inter-request delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    /// Build a range, clamping each bound into `0..=MAX_DELAY_SECS` and
    /// ordering them. NaN reads as zero.
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min_secs = clamp_secs(min_secs, MAX_DELAY_SECS);
        let max_secs = clamp_secs(max_secs, MAX_DELAY_SECS);
        if min_secs <= max_secs {
            Self { min_secs, max_secs }
        } else {
            Self {
                min_secs: max_secs,
                max_secs: min_secs,
            }
        }
    }

    pub fn min(&self) -> Duration {
        Duration::from_secs_f64(self.min_secs)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs_f64(self.max_secs)
    }

    /// Next range after an escalation step. Never lowers either bound.
    pub fn escalated(&self) -> Self {
        let min_secs = (self.min_secs + 0.5)
            .min(ESCALATION_MIN_CAP_SECS)
            .max(self.min_secs);
        let max_secs = (self.max_secs + 1.0)
            .min(ESCALATION_MAX_CAP_SECS)
            .max(self.max_secs);
        Self::new(min_secs, max_secs)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY_SECS, DEFAULT_MAX_DELAY_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_cover_platforms() {
        let rules = default_rules();
        assert_eq!(rules["stubhub"], RateLimitRule::new(10, 60.0));
        assert_eq!(rules["funzone"].requests, 10);
        assert_eq!(rules["tickpick"].window_ms(), 60_000);
    }

    #[test]
    fn test_delay_range_orders_bounds() {
        let range = DelayRange::new(3.0, 1.0);
        assert_eq!(range.min_secs, 1.0);
        assert_eq!(range.max_secs, 3.0);
    }

    #[test]
    fn test_delay_range_rejects_non_finite() {
        let range = DelayRange::new(f64::NAN, f64::INFINITY);
        assert_eq!(range, DelayRange::new(0.0, MAX_DELAY_SECS));
        assert_eq!(range.max(), Duration::from_secs(3_600));

        let range = DelayRange::new(f64::NEG_INFINITY, 2.0);
        assert_eq!((range.min_secs, range.max_secs), (0.0, 2.0));
    }

    #[test]
    fn test_window_ms_is_bounded() {
        assert_eq!(RateLimitRule::new(5, f64::INFINITY).window_ms(), 86_400_000);
        assert_eq!(RateLimitRule::new(5, f64::NAN).window_ms(), 0);
        assert_eq!(RateLimitRule::new(5, -3.0).window_ms(), 0);
    }

    #[test]
    fn test_escalation_caps() {
        let range = DelayRange::new(4.8, 9.5).escalated();
        assert_eq!(range.min_secs, 5.0);
        assert_eq!(range.max_secs, 10.0);

        // Values already above the caps are left alone.
        let range = DelayRange::new(7.0, 12.0).escalated();
        assert_eq!(range.min_secs, 7.0);
        assert_eq!(range.max_secs, 12.0);
    }
}
