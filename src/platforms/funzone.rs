//! FunZone (funzone.sk): Slovak marketplace, scrape only.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::core::{
    build_url, clean_title, listing_count, listing_prices, parse_ticket_count, price_texts,
    ScraperCore,
};
use super::PlatformClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    AvailabilityStatus, NormalizedEvent, Platform, PriceEntry, SearchCriteria, Venue,
};
use crate::rate_limit::RateGovernor;
use crate::scrapers::extract::{element_text, extract_price_with_fallbacks, try_selectors};
use crate::scrapers::normalize::{extract_city, name_from_slug};

pub const BASE_URL: &str = "https://www.funzone.sk";

const CURRENCY: &str = "EUR";
const COUNTRY: &str = "Slovakia";
const MAX_LIMIT: usize = 50;

const CARD_SELECTORS: &[&str] = &[
    r#"div[class*="event-card"]"#,
    r#"div[class*="event-item"]"#,
    r#"article[class*="event"]"#,
    r#"div[class*="listing"]"#,
    r#"div[class*="product-item"]"#,
];
const LINK_FALLBACK: &str = r#"a[href*="/event/"], a[href*="/events/"], a[href*="/show/"]"#;

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    r#"span[class*="title"]"#,
    r#"a[class*="event-title"]"#,
    r#"div[class*="event-name"]"#,
    r#"span[class*="name"]"#,
];
const LINK_SELECTORS: &[&str] = &[r#"a[href*="/event/"]"#, r#"a[href*="/show/"]"#, r#"a[href*="/events/"]"#];
const DATE_SELECTORS: &[&str] = &[
    r#"span[class*="date"]"#,
    r#"div[class*="date"]"#,
    "time",
    r#"span[class*="datum"]"#,
];
const VENUE_SELECTORS: &[&str] = &[
    r#"span[class*="venue"]"#,
    r#"div[class*="venue"]"#,
    r#"p[class*="venue"]"#,
    r#"span[class*="miesto"]"#,
];
const LOCATION_SELECTORS: &[&str] = &[
    r#"span[class*="location"]"#,
    r#"div[class*="city"]"#,
    r#"span[class*="city"]"#,
    r#"span[class*="mesto"]"#,
];
const PRICE_SELECTORS: &[&str] = &[
    r#"span[class*="price"]"#,
    r#"div[class*="price"]"#,
    r#"span[class*="cena"]"#,
];
const PRICE_MARKERS: &[&str] = &["€", "EUR", "Kč"];
const QUANTITY_SELECTORS: &[&str] = &[r#"span[class*="available"]"#, r#"div[class*="quantity"]"#];
const CATEGORY_SELECTORS: &[&str] = &[
    r#"span[class*="category"]"#,
    r#"div[class*="genre"]"#,
    r#"span[class*="typ"]"#,
];
const SUMMARY_SELECTORS: &[&str] = &[
    r#"div[class*="description"]"#,
    r#"p[class*="desc"]"#,
    r#"div[class*="summary"]"#,
];

const LISTING_ROWS: &[&str] = &[
    r#"div[class*="ticket-listing"]"#,
    r#"div[class*="price-row"]"#,
    r#"tr[class*="ticket"]"#,
    r#"div[class*="cenova-kategoria"]"#,
];
const LISTING_PRICES: &[&str] = &[r#"[class*="price"]"#, r#"[class*="cena"]"#];
const LISTING_SECTIONS: &[&str] = &[r#"[class*="category"]"#, r#"[class*="section"]"#];

/// Slovak layouts not covered by the shared list ("25.12.2024 o 20:00").
const DATE_FORMATS: &[&str] = &["%d.%m.%Y o %H:%M", "%d. %m. %Y o %H:%M", "%d.%m.%Y, %H:%M"];

static EVENT_NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:event|show)/(\d+)").unwrap());
static EVENT_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:event|show)/([^/?#]+)").unwrap());
static CAPACITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d\s]*)").unwrap());

pub struct FunZoneClient {
    core: ScraperCore,
}

impl FunZoneClient {
    pub fn new(config: &Config, rate: RateGovernor) -> Result<Self> {
        let headers = HashMap::from([(
            "Accept-Language".to_string(),
            "sk-SK,sk;q=0.9,cs;q=0.8,en;q=0.7".to_string(),
        )]);
        Ok(Self {
            core: ScraperCore::new(Platform::FunZone, config, BASE_URL, headers, rate)?,
        })
    }

    fn venue_url(&self, venue_id: &str) -> String {
        format!("{}/venue/{}", self.core.base_url(), venue_id)
    }

    /// Venue details from a venue page. `None` when the page has no name.
    fn extract_venue(&self, document: &Html, venue_id: &str) -> Option<Venue> {
        let root = document.root_element();
        let mut venue = Venue::placeholder(Platform::FunZone, venue_id, COUNTRY);

        let name = try_selectors(root, &["h1"], None);
        let name = if name.is_empty() {
            clean_title(&try_selectors(root, &["title"], None))
        } else {
            name
        };
        if name.is_empty() {
            return None;
        }
        venue.name = name;

        let address = try_selectors(
            root,
            &["address", r#"div[class*="address"]"#, r#"span[class*="adresa"]"#],
            None,
        );
        let city = try_selectors(
            root,
            &[r#"span[class*="city"]"#, r#"div[class*="city"]"#, r#"span[class*="mesto"]"#],
            None,
        );
        venue.city = if city.is_empty() { extract_city(&address) } else { city };
        venue.address = (!address.is_empty()).then_some(address);

        let capacity = try_selectors(
            root,
            &[r#"[class*="capacity"]"#, r#"[class*="kapacita"]"#],
            None,
        );
        venue.capacity = CAPACITY
            .captures(&capacity)
            .and_then(|caps| caps[1].split_whitespace().collect::<String>().parse().ok());

        let description = try_selectors(
            root,
            &[r#"div[class*="description"]"#, r#"section[class*="about"]"#],
            None,
        );
        venue.description = (!description.is_empty()).then_some(description);

        if let Ok(selector) =
            Selector::parse(r#"ul[class*="amenities"] li, div[class*="facilities"] li"#)
        {
            venue.amenities = document
                .select(&selector)
                .map(|item| element_text(&item))
                .filter(|item| !item.is_empty())
                .collect();
        }

        Some(venue)
    }
}

/// Availability words used on FunZone pages.
fn status_from_text(text: &str) -> AvailabilityStatus {
    let text = text.to_lowercase();
    if text.contains("vypredané") || text.contains("sold out") {
        AvailabilityStatus::SoldOut
    } else if text.contains("dostupné") || text.contains("available") {
        AvailabilityStatus::Available
    } else if text.contains("predpredaj") {
        AvailabilityStatus::Presale
    } else if text.contains("zrušené") {
        AvailabilityStatus::Cancelled
    } else {
        AvailabilityStatus::Unknown
    }
}

#[async_trait]
impl PlatformClient for FunZoneClient {
    fn core(&self) -> &ScraperCore {
        &self.core
    }

    fn default_currency(&self) -> &'static str {
        CURRENCY
    }

    fn default_country(&self) -> &'static str {
        COUNTRY
    }

    fn date_formats(&self) -> &'static [&'static str] {
        DATE_FORMATS
    }

    /// Every FunZone listing is in Slovakia.
    fn country_for(&self, _location: &str) -> String {
        COUNTRY.to_string()
    }

    fn search_url(&self, criteria: &SearchCriteria) -> String {
        build_url(
            self.core.base_url(),
            "/events",
            &[
                ("search", criteria.q.clone()),
                ("city", criteria.location_str().to_string()),
                ("date_from", criteria.date_start.map(|d| d.to_string()).unwrap_or_default()),
                ("date_to", criteria.date_end.map(|d| d.to_string()).unwrap_or_default()),
                ("sort", "date".to_string()),
                ("limit", criteria.per_page.min(MAX_LIMIT).to_string()),
            ],
        )
    }

    /// Ids containing a path are resolved against the site.
    fn event_url(&self, event_id: &str) -> String {
        if event_id.contains('/') {
            self.core.absolute_url(event_id)
        } else {
            format!("{}/event/{}", self.core.base_url(), event_id)
        }
    }

    fn card_selectors(&self) -> &'static [&'static str] {
        CARD_SELECTORS
    }

    fn link_fallback_selector(&self) -> Option<&'static str> {
        Some(LINK_FALLBACK)
    }

    fn event_id_from_url(&self, url: &str) -> Option<String> {
        EVENT_NUMERIC_ID
            .captures(url)
            .or_else(|| EVENT_SLUG.captures(url))
            .map(|caps| caps[1].to_string())
    }

    fn event_name_from_url(&self, url: &str) -> Option<String> {
        EVENT_SLUG
            .captures(url)
            .map(|caps| name_from_slug(&caps[1]))
            .filter(|name| !name.is_empty())
    }

    fn extract_event_from_node(&self, node: ElementRef<'_>) -> NormalizedEvent {
        let stats = self.core.stats();
        let mut event = NormalizedEvent::new(Platform::FunZone);

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

        let category = try_selectors(node, CATEGORY_SELECTORS, None);
        event.category = (!category.is_empty()).then_some(category);
        let summary = try_selectors(node, SUMMARY_SELECTORS, None);
        event.description = (!summary.is_empty()).then_some(summary);

        event
    }

    fn extract_event_details(&self, document: &Html, url: &str) -> NormalizedEvent {
        let root = document.root_element();
        let mut event = NormalizedEvent::new(Platform::FunZone);
        event.url = Some(url.to_string());

        event.title = try_selectors(root, &["h1"], None);
        if event.title.is_empty() {
            event.title = clean_title(&try_selectors(root, &["title"], None));
        }

        let date = try_selectors(
            root,
            &[
                r#"span[class*="event-date"]"#,
                r#"div[class*="date"]"#,
                "time",
                r#"span[class*="datum"]"#,
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
                r#"span[class*="venue"]"#,
                r#"div[class*="venue"]"#,
                r#"h2[class*="venue"]"#,
                r#"span[class*="miesto"]"#,
            ],
            None,
        );
        event.location = try_selectors(
            root,
            &[
                r#"span[class*="location"]"#,
                "address",
                r#"div[class*="city"]"#,
                r#"span[class*="adresa"]"#,
            ],
            None,
        );

        let description = try_selectors(
            root,
            &[
                r#"div[class*="description"]"#,
                r#"div[class*="event-info"]"#,
                r#"section[class*="about"]"#,
                r#"div[class*="popis"]"#,
            ],
            None,
        );
        event.description = (!description.is_empty()).then_some(description);

        let category = try_selectors(root, CATEGORY_SELECTORS, None);
        event.category = (!category.is_empty()).then_some(category);

        let status = try_selectors(
            root,
            &[r#"span[class*="status"]"#, r#"div[class*="availability"]"#],
            None,
        );
        if !status.is_empty() {
            event.availability = status_from_text(&status);
        }

        event.price_entries =
            extract_price_with_fallbacks(document, self.core.rules(), |doc| self.extract_prices(doc));
        let listings = listing_count(document, LISTING_ROWS);
        if listings > 0 {
            event.ticket_count = u32::try_from(listings).ok();
        }

        event
    }

    fn extract_prices(&self, document: &Html) -> Vec<PriceEntry> {
        listing_prices(document, LISTING_ROWS, LISTING_PRICES, LISTING_SECTIONS, CURRENCY)
    }

    async fn get_venue(&self, venue_id: &str) -> Venue {
        let url = self.venue_url(venue_id);
        let referer = self.core.base_url().to_string();

        if let Some(html) = self.core.fetch_page(&url, Some(&referer)).await {
            let document = Html::parse_document(&html);
            if let Some(venue) = self.extract_venue(&document, venue_id) {
                return venue;
            }
        }

        debug!(venue_id, "Using placeholder FunZone venue");
        Venue::placeholder(Platform::FunZone, venue_id, COUNTRY)
    }
}
