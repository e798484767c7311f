//! Shared state and extraction helpers composed into every platform client.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::{Config, PlatformConfig};
use crate::error::{Result, ScrapeError};
use crate::models::{NormalizedEvent, Platform, PriceEntry, ScrapeRequest};
use crate::rate_limit::RateGovernor;
use crate::scrapers::detect::{detect_selectors, own_text, DetectionRules, SelectorKind};
use crate::scrapers::extract::{element_text, try_selectors, SelectorStats};
use crate::scrapers::http_client::ScrapingHttpClient;
use crate::scrapers::normalize::{
    detect_currency, extract_city, extract_numeric_price, extract_numeric_price_in,
    extract_price_range, normalize_url, PriceFormat,
};

static TICKET_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:tickets?|listings?|lístok|lístk\w*|voľn\w*)").unwrap()
});

static TICKETS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+tickets?\s*$").unwrap());

/// Per-client state: configuration, HTTP client, selector statistics and the
/// heuristic rule table.
pub struct ScraperCore {
    platform: Platform,
    config: PlatformConfig,
    http: ScrapingHttpClient,
    base_url: String,
    stats: SelectorStats,
    rules: DetectionRules,
}

impl ScraperCore {
    pub fn new(
        platform: Platform,
        config: &Config,
        default_base_url: &str,
        extra_headers: HashMap<String, String>,
        rate: RateGovernor,
    ) -> Result<Self> {
        let platform_config = config.platform(platform);
        let base_url = platform_config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string())
            .trim_end_matches('/')
            .to_string();
        let http =
            ScrapingHttpClient::new(platform, platform_config.http_options(extra_headers), rate)?;

        Ok(Self {
            platform,
            config: platform_config,
            http,
            base_url,
            stats: SelectorStats::new(platform.as_str()),
            rules: config.detection.clone(),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn http(&self) -> &ScrapingHttpClient {
        &self.http
    }

    pub fn stats(&self) -> &SelectorStats {
        &self.stats
    }

    pub fn rules(&self) -> &DetectionRules {
        &self.rules
    }

    /// Public site origin, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a link found on the site.
    pub fn absolute_url(&self, href: &str) -> String {
        normalize_url(href, &self.base_url)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether the HTML fallback may run.
    pub fn scraping_enabled(&self) -> bool {
        self.config.enabled && self.config.scraping.enabled
    }

    /// Whether the API path may run.
    pub fn api_available(&self) -> bool {
        self.config.enabled && self.config.has_api_credentials()
    }

    /// `ScrapingDisabled` unless the HTML fallback may run.
    pub fn ensure_scraping_enabled(&self) -> Result<()> {
        if self.scraping_enabled() {
            Ok(())
        } else {
            Err(ScrapeError::ScrapingDisabled(self.platform.to_string()))
        }
    }

    /// Fetch a page. `None` when scraping is disabled or the fetch failed.
    pub async fn fetch_page(&self, url: &str, referer: Option<&str>) -> Option<String> {
        if let Err(e) = self.ensure_scraping_enabled() {
            debug!(url, error = %e, "Skipping fetch");
            return None;
        }

        let mut request = ScrapeRequest::get(self.platform, url);
        if let Some(referer) = referer {
            request = request.with_referer(referer);
        }

        let body = self.http.make_scraping_request(&request).await;
        (!body.is_empty()).then_some(body)
    }
}

/// `base` + `path` with URL-encoded query parameters. Empty values are
/// dropped.
pub fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> String {
    let params: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    let joined = format!("{}{}", base.trim_end_matches('/'), path);

    match Url::parse(&joined) {
        Ok(mut url) => {
            if !params.is_empty() {
                let mut query = url.query_pairs_mut();
                for (key, value) in &params {
                    query.append_pair(key, value);
                }
            }
            url.to_string()
        }
        Err(_) => {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect();
            if query.is_empty() {
                joined
            } else {
                format!("{}?{}", joined, query.join("&"))
            }
        }
    }
}

/// Result cards: every match of the first known selector present in the
/// document, else of the first heuristically detected container.
pub fn find_cards<'a>(
    document: &'a Html,
    selectors: &[&str],
    rules: &DetectionRules,
) -> Vec<ElementRef<'a>> {
    for candidate in selectors {
        let Ok(selector) = Selector::parse(candidate) else {
            continue;
        };
        let cards: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if !cards.is_empty() {
            return cards;
        }
    }

    for detected in detect_selectors(document, SelectorKind::Event, rules) {
        let Ok(selector) = Selector::parse(&detected) else {
            continue;
        };
        let cards: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if !cards.is_empty() {
            debug!(selector = %detected, "Using detected event container");
            return cards;
        }
    }

    Vec::new()
}

/// Price strings under `root`: text of elements matching `selectors`, plus
/// elements whose own text carries one of `markers`. Only strings holding
/// both a currency and a number are kept, deduplicated in document order.
pub fn price_texts(root: ElementRef, selectors: &[&str], markers: &[&str]) -> Vec<String> {
    let mut texts: Vec<String> = Vec::new();
    let mut push = |text: String| {
        if detect_currency(&text).is_some()
            && extract_numeric_price(&text).is_some()
            && !texts.contains(&text)
        {
            texts.push(text);
        }
    };

    for candidate in selectors {
        if let Ok(selector) = Selector::parse(candidate) {
            for node in root.select(&selector) {
                push(element_text(&node));
            }
        }
    }

    if !markers.is_empty() {
        for node in root.descendants().filter_map(ElementRef::wrap) {
            let text = own_text(&node);
            if markers.iter().any(|m| text.contains(m)) {
                push(text.trim().to_string());
            }
        }
    }

    texts
}

/// Per-section prices from listing rows. Each row contributes its first
/// parseable price and a section name (default "General"). Without rows,
/// every element matching `price_selectors` is read instead. Prices without
/// a currency marker are in `default_currency` and read in its convention.
pub fn listing_prices(
    document: &Html,
    row_selectors: &[&str],
    price_selectors: &[&str],
    section_selectors: &[&str],
    default_currency: &str,
) -> Vec<PriceEntry> {
    let mut prices = Vec::new();
    let rows = first_matches(document, row_selectors);

    if rows.is_empty() {
        for candidate in price_selectors {
            let Ok(selector) = Selector::parse(candidate) else {
                continue;
            };
            for node in document.select(&selector) {
                if let Some(entry) = price_entry(&element_text(&node), "General", default_currency)
                {
                    prices.push(entry);
                }
            }
            if !prices.is_empty() {
                break;
            }
        }
        return prices;
    }

    for row in rows {
        let section = try_selectors(row, section_selectors, None);
        let section = if section.is_empty() { "General" } else { section.as_str() };
        let text = try_selectors(row, price_selectors, None);
        if let Some(entry) = price_entry(&text, section, default_currency) {
            prices.push(entry);
        }
    }
    prices
}

/// Number of listing rows matching the first present selector.
pub fn listing_count(document: &Html, row_selectors: &[&str]) -> usize {
    first_matches(document, row_selectors).len()
}

fn first_matches<'a>(document: &'a Html, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|s| document.select(&s).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default()
}

fn price_entry(text: &str, section: &str, default_currency: &str) -> Option<PriceEntry> {
    let price = extract_numeric_price_in(text, PriceFormat::for_currency(default_currency))?;
    let currency = detect_currency(text).unwrap_or(default_currency);
    Some(PriceEntry::new(price, currency, section))
}

/// Ticket count from text like "12 tickets available" or "5 voľných lístkov".
pub fn parse_ticket_count(text: &str) -> Option<u32> {
    TICKET_COUNT
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Page title without the site suffix ("Name | Site") or a trailing
/// "Tickets".
pub fn clean_title(raw: &str) -> String {
    let title = raw.split('|').next().unwrap_or("").trim();
    TICKETS_SUFFIX.replace(title, "").trim().to_string()
}

/// Fill derived fields once extraction is done: price range, city, country
/// and availability.
pub fn finalize_event(
    mut event: NormalizedEvent,
    default_currency: &str,
    country: String,
) -> NormalizedEvent {
    if event.price_range.is_none() {
        event.price_range = extract_price_range(&event.prices, default_currency);
    }
    event.fill_range_from_entries(default_currency);

    if event.city.is_none() && !event.location.trim().is_empty() {
        event.city = Some(extract_city(&event.location));
    }
    if event.country.is_none() {
        event.country = Some(country);
    }

    event.settle_availability();
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AvailabilityStatus;

    #[test]
    fn test_scraping_disabled_is_reported() {
        let mut config = Config::default();
        config.platforms.insert(
            "tickpick".to_string(),
            PlatformConfig {
                scraping: crate::config::ScrapingConfig {
                    enabled: false,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let core = ScraperCore::new(
            Platform::TickPick,
            &config,
            "https://www.tickpick.com",
            HashMap::new(),
            RateGovernor::in_memory(),
        )
        .unwrap();

        let err = core.ensure_scraping_enabled().unwrap_err();
        assert!(matches!(err, ScrapeError::ScrapingDisabled(ref p) if p == "tickpick"));
        assert!(!core.api_available());

        let core = ScraperCore::new(
            Platform::FunZone,
            &Config::default(),
            "https://www.funzone.sk",
            HashMap::new(),
            RateGovernor::in_memory(),
        )
        .unwrap();
        assert!(core.ensure_scraping_enabled().is_ok());
    }

    #[test]
    fn test_build_url_encodes_and_skips_empty() {
        let url = build_url(
            "https://www.example.com/",
            "/search",
            &[
                ("q", "Lakers & Celtics".to_string()),
                ("city", String::new()),
                ("rows", "50".to_string()),
            ],
        );
        assert_eq!(
            url,
            "https://www.example.com/search?q=Lakers+%26+Celtics&rows=50"
        );
    }

    #[test]
    fn test_find_cards_prefers_known_selectors() {
        let doc = Html::parse_document(
            r#"<div class="EventCard">a</div><div class="EventCard">b</div>
               <div class="event-card">c</div>"#,
        );
        let cards = find_cards(&doc, &[".EventCard", ".event-card"], &DetectionRules::default());
        assert_eq!(cards.len(), 2);
    }

    #[test]
    fn test_find_cards_falls_back_to_detection() {
        let doc = Html::parse_document(r#"<div class="listing-tile">x</div>"#);
        let cards = find_cards(&doc, &[".EventCard"], &DetectionRules::default());
        assert_eq!(cards.len(), 1);

        let doc = Html::parse_document(r#"<p>nothing</p>"#);
        assert!(find_cards(&doc, &[".EventCard"], &DetectionRules::default()).is_empty());
    }

    #[test]
    fn test_price_texts_filters_and_dedupes() {
        let doc = Html::parse_document(
            r#"<div id="card">
                 <span class="price">From $45</span>
                 <span class="price">Free parking</span>
                 <span class="price">From $45</span>
                 <em>Vstupné 25 €</em>
               </div>"#,
        );
        let root = doc.root_element();
        assert_eq!(price_texts(root, &[".price"], &[]), vec!["From $45"]);
        assert_eq!(
            price_texts(root, &[".price"], &["€"]),
            vec!["From $45", "Vstupné 25 €"]
        );
    }

    #[test]
    fn test_listing_prices_with_sections() {
        let doc = Html::parse_document(
            r#"<div class="listing"><span class="section">Floor A</span><span class="price">$250.00</span></div>
               <div class="listing"><span class="price">$1,020</span></div>
               <div class="listing"><span class="price">call us</span></div>"#,
        );
        let prices = listing_prices(&doc, &[".listing"], &[".price"], &[".section"], "USD");
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].section, "Floor A");
        assert_eq!(prices[0].price, 250.0);
        assert_eq!(prices[1].price, 1020.0);
        assert_eq!(prices[1].section, "General");
        assert_eq!(listing_count(&doc, &[".listing"]), 3);
    }

    #[test]
    fn test_listing_prices_without_rows() {
        let doc = Html::parse_document(r#"<b class="ticket-price">€ 35,50</b>"#);
        let prices = listing_prices(&doc, &[".listing"], &[".ticket-price"], &[], "EUR");
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].currency, "EUR");
        assert_eq!(prices[0].price, 35.5);
    }

    #[test]
    fn test_listing_prices_read_euro_grouping() {
        let doc = Html::parse_document(
            r#"<div class="row"><span class="cena">1.250 €</span></div>
               <div class="row"><span class="cena">12,5</span></div>
               <div class="row"><span class="cena">35</span></div>"#,
        );
        let prices = listing_prices(&doc, &[".row"], &[".cena"], &[], "EUR");
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        assert_eq!(values, vec![1250.0, 12.5, 35.0]);
        assert!(prices.iter().all(|p| p.currency == "EUR"));
    }

    #[test]
    fn test_finalize_orders_european_range() {
        let mut event = NormalizedEvent::new(Platform::FunZone);
        event.title = "Elán".to_string();
        event.prices = vec!["od 35 €".to_string(), "1.250 €".to_string()];

        let event = finalize_event(event, "EUR", "Slovakia".to_string());
        let range = event.price_range.unwrap();
        assert_eq!((range.min, range.max), (35.0, 1250.0));
    }

    #[test]
    fn test_ticket_count() {
        assert_eq!(parse_ticket_count("142 tickets available"), Some(142));
        assert_eq!(parse_ticket_count("5 voľných miest"), Some(5));
        assert_eq!(parse_ticket_count("12 lístkov"), Some(12));
        assert_eq!(parse_ticket_count("Sold out"), None);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Taylor Swift Tickets | TickPick"), "Taylor Swift");
        assert_eq!(clean_title("HC Slovan - HC Košice"), "HC Slovan - HC Košice");
    }

    #[test]
    fn test_finalize_event_derives_fields() {
        let mut event = NormalizedEvent::new(Platform::StubHub);
        event.title = "Lakers vs Celtics".to_string();
        event.location = "Los Angeles, CA".to_string();
        event.prices = vec!["$45.00".to_string(), "$120".to_string()];

        let event = finalize_event(event, "USD", "United States".to_string());
        let range = event.price_range.clone().unwrap();
        assert_eq!((range.min, range.max), (45.0, 120.0));
        assert_eq!(event.city.as_deref(), Some("Los Angeles"));
        assert_eq!(event.country.as_deref(), Some("United States"));
        assert_eq!(event.availability, AvailabilityStatus::Available);
        assert!(event.available);
    }
}
