//! Bot-detection and error-status classification for marketplace responses.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ScrapeError;

/// Retry-After used when a 429 carries no usable header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Bodies shorter than this that contain an inline script are treated as
/// challenge redirects.
const SUSPICIOUS_BODY_LEN: usize = 500;

/// Markers of challenge and block pages served with a 2xx status.
static CHALLENGE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)captcha").unwrap(), "captcha"),
        (Regex::new(r"(?i)access\s+denied").unwrap(), "access denied"),
        (Regex::new(r"(?i)security\s+check").unwrap(), "security check"),
        (Regex::new(r"(?i)unusual\s+traffic").unwrap(), "unusual traffic"),
        (
            Regex::new(r"(?i)verify\s+you\s+are\s+(a\s+)?human").unwrap(),
            "human verification",
        ),
        (
            Regex::new(r"(?i)protected\s+by\s+recaptcha").unwrap(),
            "recaptcha",
        ),
        (
            Regex::new(r"(?i)checking\s+your\s+browser").unwrap(),
            "browser check",
        ),
    ]
});

/// Markers that turn a 403 into a bot-detection verdict.
const FORBIDDEN_BOT_MARKERS: &[&str] = &["captcha", "cloudflare", "blocked"];

/// Inspect a successful body for challenge-page markers.
///
/// Returns the reason when the page looks like an anti-bot interstitial.
pub fn detect_anti_bot(body: &str) -> Option<&'static str> {
    for (pattern, reason) in CHALLENGE_PATTERNS.iter() {
        if pattern.is_match(body) {
            return Some(reason);
        }
    }

    if body.len() < SUSPICIOUS_BODY_LEN && body.contains("<script>") {
        return Some("suspiciously short response with inline script");
    }

    None
}

/// Parse a Retry-After header given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Map a non-2xx response to its error.
pub fn classify_error_status(
    platform: &str,
    url: &str,
    status: u16,
    body: &str,
    retry_after: Option<&str>,
) -> ScrapeError {
    match status {
        403 => {
            let lower = body.to_lowercase();
            if FORBIDDEN_BOT_MARKERS.iter().any(|m| lower.contains(m)) {
                ScrapeError::BotDetected {
                    platform: platform.to_string(),
                    reason: "challenge page on 403".to_string(),
                }
            } else {
                ScrapeError::Forbidden {
                    platform: platform.to_string(),
                    url: url.to_string(),
                }
            }
        }
        429 => ScrapeError::RateLimited {
            platform: platform.to_string(),
            retry_after: parse_retry_after(retry_after),
        },
        503 => ScrapeError::BotDetected {
            platform: platform.to_string(),
            reason: "service unavailable, possible anti-bot measure".to_string(),
        },
        _ => ScrapeError::HttpStatus {
            url: url.to_string(),
            status,
        },
    }
}
