//! Scraping building blocks shared by every platform client.
//!
//! - `headers`, `user_agent`, `proxy`: make requests look like browser traffic
//! - `http_client`: governed fetches with bot-detection handling
//! - `extract`, `detect`: resilient selector and JSON-LD extraction
//! - `normalize`: pure field parsers for dates, prices, URLs and places

pub mod detect;
pub mod extract;
pub mod headers;
pub mod http_client;
pub mod normalize;
pub mod proxy;
pub mod user_agent;

pub use detect::{detect_selectors, DetectionRules, SelectorKind};
pub use extract::{
    extract_json_ld, extract_price_with_fallbacks, try_selectors, SelectorHits, SelectorStats,
};
pub use headers::build_anti_detection_headers;
pub use http_client::{HttpClientOptions, HttpResponse, ScrapingHttpClient};
pub use normalize::{
    extract_numeric_price, extract_numeric_price_in, extract_price_range, map_currency_symbol,
    normalize_url, parse_event_date, PriceFormat,
};
pub use proxy::{ProxyRotation, ProxyStrategy};
pub use user_agent::random_user_agent;
