//! Browser-like request headers.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::user_agent::resolve_user_agent;

/// Header set sent with every scraping request.
///
/// `extra` entries win on key collision (compared case-insensitively). A
/// referer marks the request as same-origin navigation.
pub fn build_anti_detection_headers(
    extra: &HashMap<String, String>,
    referer: Option<&str>,
    user_agent: Option<&str>,
) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = [
        ("User-Agent", resolve_user_agent(user_agent)),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"
                .to_string(),
        ),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("Accept-Encoding", "gzip, deflate, br".to_string()),
        ("DNT", "1".to_string()),
        ("Connection", "keep-alive".to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
        ("Sec-Fetch-Dest", "document".to_string()),
        ("Sec-Fetch-Mode", "navigate".to_string()),
        ("Sec-Fetch-Site", "none".to_string()),
        ("Sec-Fetch-User", "?1".to_string()),
        ("Cache-Control", "max-age=0".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    if let Some(referer) = referer {
        headers.insert("Referer".to_string(), referer.to_string());
        headers.insert("Sec-Fetch-Site".to_string(), "same-origin".to_string());
    }

    for (key, value) in extra {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        headers.insert(key.clone(), value.clone());
    }

    headers
}

/// Convert a header map into reqwest headers, skipping invalid entries.
pub fn to_header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => debug!(header = %key, "Skipping invalid header"),
        }
    }
    map
}
