//! Error types for scraping operations.
//!
//! These errors never cross the public platform-client surface: clients log
//! them and degrade to empty or partial results.

use std::time::Duration;

/// Result type for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors raised while fetching or parsing marketplace pages.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("bot detection triggered for {platform}: {reason}")]
    BotDetected { platform: String, reason: String },
    #[error("rate limit exceeded for {platform}, retry after {retry_after:?}")]
    RateLimited {
        platform: String,
        retry_after: Duration,
    },
    #[error("access forbidden for {platform} ({url})")]
    Forbidden { platform: String, url: String },
    #[error("request to {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("scraping fallback not enabled for {0}")]
    ScrapingDisabled(String),
}

impl ScrapeError {
    /// Wrap a reqwest error, separating timeouts from other transport failures.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScrapeError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// True when the marketplace actively pushed back (bot wall, 403, 429).
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ScrapeError::BotDetected { .. }
                | ScrapeError::RateLimited { .. }
                | ScrapeError::Forbidden { .. }
        )
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::Parse(e.to_string())
    }
}
