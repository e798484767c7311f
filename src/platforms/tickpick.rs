//! TickPick: US marketplace with all-in ("no fee") pricing, scrape only.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::core::{
    build_url, clean_title, listing_count, listing_prices, parse_ticket_count, price_texts,
    ScraperCore,
};
use super::PlatformClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{NormalizedEvent, Platform, PriceEntry, SearchCriteria};
use crate::rate_limit::RateGovernor;
use crate::scrapers::detect::own_text;
use crate::scrapers::extract::{extract_price_with_fallbacks, try_selectors};
use crate::scrapers::normalize::name_from_slug;

pub const BASE_URL: &str = "https://www.tickpick.com";

const CURRENCY: &str = "USD";
const COUNTRY: &str = "United States";
const MAX_LIMIT: usize = 50;

const CARD_SELECTORS: &[&str] = &[
    r#"div[class*="event-card"]"#,
    r#"div[class*="search-item"]"#,
    r#"article[class*="event"]"#,
    r#"div[class*="ticket-listing"]"#,
];
const LINK_FALLBACK: &str = r#"a[href*="/buy-"][href*="-tickets"]"#;

const TITLE_SELECTORS: &[&str] = &[
    "h2",
    "h3",
    "h4",
    r#"span[class*="title"]"#,
    r#"a[class*="event-title"]"#,
    r#"div[class*="event-name"]"#,
];
const LINK_SELECTORS: &[&str] = &[r#"a[href*="/buy-"]"#, r#"a[href*="-tickets"]"#];
const DATE_SELECTORS: &[&str] = &[
    r#"span[class*="date"]"#,
    r#"div[class*="date"]"#,
    "time",
    r#"span[class*="event-date"]"#,
];
const VENUE_SELECTORS: &[&str] = &[
    r#"span[class*="venue"]"#,
    r#"div[class*="venue"]"#,
    r#"p[class*="venue"]"#,
];
const LOCATION_SELECTORS: &[&str] = &[
    r#"span[class*="location"]"#,
    r#"div[class*="location"]"#,
    r#"span[class*="city"]"#,
];
const PRICE_SELECTORS: &[&str] = &[r#"span[class*="price"]"#, r#"div[class*="price"]"#];
const PRICE_MARKERS: &[&str] = &["$"];
const QUANTITY_SELECTORS: &[&str] = &[
    r#"span[class*="available"]"#,
    r#"span[class*="quantity"]"#,
    r#"div[class*="tickets"]"#,
];
const CATEGORY_SELECTORS: &[&str] = &[
    r#"span[class*="category"]"#,
    r#"span[class*="genre"]"#,
    r#"span[class*="sport"]"#,
];

const LISTING_ROWS: &[&str] = &[
    r#"div[class*="listing"]"#,
    r#"div[class*="ticket-row"]"#,
    r#"tr[class*="ticket"]"#,
    r#"div[class*="price-row"]"#,
];
const LISTING_PRICES: &[&str] = &[r#"[class*="price"]"#];
const LISTING_SECTIONS: &[&str] = &[r#"[class*="section"]"#, r#"[class*="zone"]"#];

const NO_FEE_CLASS: &str = r#"[class*="no-fee"], [class*="nofee"]"#;
const CARD_NO_FEE_MARKERS: &[&str] = &["no fee", "all-in"];
const PAGE_NO_FEE_MARKERS: &[&str] = &["no fee", "all-in", "final price"];

static EVENT_NUMERIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d+)/?$").unwrap());
static EVENT_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/buy-([^/?#]+)").unwrap());
static EVENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/buy-(.+?)-tickets").unwrap());

pub struct TickPickClient {
    core: ScraperCore,
}

impl TickPickClient {
    pub fn new(config: &Config, rate: RateGovernor) -> Result<Self> {
        Ok(Self {
            core: ScraperCore::new(Platform::TickPick, config, BASE_URL, HashMap::new(), rate)?,
        })
    }
}

/// Whether `root` advertises fee-free pricing, by class or by wording.
fn has_no_fee_marker(root: ElementRef, markers: &[&str]) -> bool {
    if let Ok(selector) = Selector::parse(NO_FEE_CLASS) {
        if root.select(&selector).next().is_some() {
            return true;
        }
    }
    root.descendants().filter_map(ElementRef::wrap).any(|node| {
        let text = own_text(&node).to_lowercase();
        markers.iter().any(|m| text.contains(m))
    })
}

#[async_trait]
impl PlatformClient for TickPickClient {
    fn core(&self) -> &ScraperCore {
        &self.core
    }

    fn default_currency(&self) -> &'static str {
        CURRENCY
    }

    fn default_country(&self) -> &'static str {
        COUNTRY
    }

    fn search_url(&self, criteria: &SearchCriteria) -> String {
        build_url(
            self.core.base_url(),
            "/buy-tickets",
            &[
                ("q", criteria.q.clone()),
                ("location", criteria.location_str().to_string()),
                ("date_from", criteria.date_start.map(|d| d.to_string()).unwrap_or_default()),
                ("date_to", criteria.date_end.map(|d| d.to_string()).unwrap_or_default()),
                ("sort", "date".to_string()),
                ("limit", criteria.per_page.min(MAX_LIMIT).to_string()),
            ],
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/buy-tickets/{}", self.core.base_url(), event_id)
    }

    fn card_selectors(&self) -> &'static [&'static str] {
        CARD_SELECTORS
    }

    fn link_fallback_selector(&self) -> Option<&'static str> {
        Some(LINK_FALLBACK)
    }

    fn event_id_from_url(&self, url: &str) -> Option<String> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        EVENT_NUMERIC_ID
            .captures(path)
            .or_else(|| EVENT_SLUG.captures(path))
            .map(|caps| caps[1].to_string())
    }

    fn event_name_from_url(&self, url: &str) -> Option<String> {
        EVENT_NAME
            .captures(url)
            .map(|caps| name_from_slug(&caps[1]))
            .filter(|name| !name.is_empty())
    }

    fn extract_event_from_node(&self, node: ElementRef<'_>) -> NormalizedEvent {
        let stats = self.core.stats();
        let mut event = NormalizedEvent::new(Platform::TickPick);

        event.title = stats.try_selectors(node, TITLE_SELECTORS, None);

        let href = stats.try_selectors(node, LINK_SELECTORS, Some("href"));
        if !href.is_empty() {
            let url = self.core.absolute_url(&href);
            event.external_id = self.event_id_from_url(&url);
            event.url = Some(url);
        }

        let date = stats.try_selectors(node, DATE_SELECTORS, None);
        if !date.is_empty() {
            event.event_date = self.parse_date(&date);
            event.raw_date = Some(date);
        }

        event.venue = stats.try_selectors(node, VENUE_SELECTORS, None);
        event.location = try_selectors(node, LOCATION_SELECTORS, None);
        event.prices = price_texts(node, PRICE_SELECTORS, PRICE_MARKERS);
        event.ticket_count = parse_ticket_count(&try_selectors(node, QUANTITY_SELECTORS, None));
        event.no_fee = has_no_fee_marker(node, CARD_NO_FEE_MARKERS);

        event
    }

    fn extract_event_details(&self, document: &Html, url: &str) -> NormalizedEvent {
        let root = document.root_element();
        let mut event = NormalizedEvent::new(Platform::TickPick);
        event.url = Some(url.to_string());

        event.title = try_selectors(root, &["h1"], None);
        if event.title.is_empty() {
            event.title = clean_title(&try_selectors(root, &["title"], None));
        }
        if event.title.is_empty() {
            if let Some(name) = self.event_name_from_url(url) {
                event.title = name;
            }
        }

        let date = try_selectors(
            root,
            &[
                r#"div[class*="event-date"]"#,
                r#"span[class*="date"]"#,
                "time",
            ],
            None,
        );
        if !date.is_empty() {
            event.event_date = self.parse_date(&date);
            event.raw_date = Some(date);
        }

        event.venue = try_selectors(
            root,
            &[
                r#"div[class*="venue"]"#,
                r#"span[class*="venue"]"#,
                r#"h2[class*="venue"]"#,
            ],
            None,
        );
        event.location = try_selectors(
            root,
            &[r#"span[class*="location"]"#, r#"div[class*="location"]"#, "address"],
            None,
        );

        let description = try_selectors(
            root,
            &[
                r#"div[class*="description"]"#,
                r#"div[class*="event-info"]"#,
                r#"section[class*="about"]"#,
            ],
            None,
        );
        event.description = (!description.is_empty()).then_some(description);

        let category = try_selectors(root, CATEGORY_SELECTORS, None);
        event.category = (!category.is_empty()).then_some(category);

        event.price_entries =
            extract_price_with_fallbacks(document, self.core.rules(), |doc| self.extract_prices(doc));
        let listings = listing_count(document, LISTING_ROWS);
        if listings > 0 {
            event.ticket_count = u32::try_from(listings).ok();
        }
        event.no_fee = has_no_fee_marker(root, PAGE_NO_FEE_MARKERS);

        event
    }

    fn extract_prices(&self, document: &Html) -> Vec<PriceEntry> {
        listing_prices(document, LISTING_ROWS, LISTING_PRICES, LISTING_SECTIONS, CURRENCY)
    }
}
