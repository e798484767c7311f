//! Viagogo: international resale marketplace, scrape only.
//!
//! Listings are priced in the currency shown on the page, else the one
//! implied by the event's country (EUR when nothing else is known). Every
//! listing carries Viagogo's buyer guarantee.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::core::{
    build_url, clean_title, finalize_event, listing_count, listing_prices, parse_ticket_count,
    price_texts, ScraperCore,
};
use super::PlatformClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    AvailabilityStatus, Guarantee, GuaranteeKind, NormalizedEvent, Platform, PriceEntry,
    SearchCriteria,
};
use crate::rate_limit::RateGovernor;
use crate::scrapers::detect::own_text;
use crate::scrapers::extract::{extract_price_with_fallbacks, try_selectors};
use crate::scrapers::normalize::{determine_country, name_from_slug};

pub const BASE_URL: &str = "https://www.viagogo.com";

const CURRENCY: &str = "EUR";
const COUNTRY: &str = "Unknown Country";
const MAX_PAGE_SIZE: usize = 50;

const CARD_SELECTORS: &[&str] = &[
    r#"div[class*="event-card"]"#,
    r#"div[class*="search-result"]"#,
    r#"article[class*="event"]"#,
    r#"div[class*="listing-item"]"#,
];
const LINK_FALLBACK: &str = r#"a[href*="/event/"], a[href*="/e-"]"#;

const TITLE_SELECTORS: &[&str] = &[
    "h2",
    "h3",
    "h4",
    r#"span[class*="title"]"#,
    r#"a[class*="event-title"]"#,
];
const LINK_SELECTORS: &[&str] = &[
    r#"a[href*="/event/"]"#,
    r#"a[href*="/e-"]"#,
    r#"a[href*="/tickets/"]"#,
];
const DATE_SELECTORS: &[&str] = &[r#"span[class*="date"]"#, r#"div[class*="date"]"#, "time"];
const VENUE_SELECTORS: &[&str] = &[
    r#"span[class*="venue"]"#,
    r#"div[class*="venue"]"#,
    r#"p[class*="venue"]"#,
];
const LOCATION_SELECTORS: &[&str] = &[
    r#"span[class*="location"]"#,
    r#"div[class*="city"]"#,
    r#"span[class*="city"]"#,
];
const PRICE_SELECTORS: &[&str] = &[r#"span[class*="price"]"#, r#"div[class*="price"]"#];
const PRICE_MARKERS: &[&str] = &["€", "$", "£"];
const QUANTITY_SELECTORS: &[&str] = &[r#"span[class*="available"]"#, r#"span[class*="listings"]"#];
const STATUS_SELECTORS: &[&str] = &[r#"span[class*="status"]"#, r#"div[class*="availability"]"#];

const LISTING_ROWS: &[&str] = &[
    r#"div[class*="listing"]"#,
    r#"div[class*="ticket-row"]"#,
    r#"tr[class*="ticket"]"#,
];
const LISTING_PRICES: &[&str] = &[r#"[class*="price"]"#];
const LISTING_SECTIONS: &[&str] = &[r#"[class*="section"]"#, r#"[class*="zone"]"#];

/// "14 Jun 2025, 19:30" and "Jun 14, 2025 19:30".
const DATE_FORMATS: &[&str] = &["%d %b %Y, %H:%M", "%b %d, %Y %H:%M"];

const GUARANTEE_COVERAGE: &[(&str, &str)] = &[
    ("authenticity", "Guaranteed authentic tickets"),
    ("delivery", "Guaranteed delivery or full refund"),
    ("event_cancellation", "Full refund if event is cancelled"),
    ("replacement", "Replacement tickets if there are issues"),
];

static EVENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(?:event/|e-)(\d+)").unwrap());
static EVENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([^/?#]+)/e-\d+").unwrap());

pub struct ViagogoClient {
    core: ScraperCore,
}

impl ViagogoClient {
    pub fn new(config: &Config, rate: RateGovernor) -> Result<Self> {
        let headers = HashMap::from([(
            "Accept-Language".to_string(),
            "en-US,en;q=0.9".to_string(),
        )]);
        Ok(Self {
            core: ScraperCore::new(Platform::Viagogo, config, BASE_URL, headers, rate)?,
        })
    }
}

/// Currency implied by where the event takes place.
fn currency_for_location(location: &str) -> &'static str {
    match determine_country(location, "").as_str() {
        "United Kingdom" => "GBP",
        "United States" => "USD",
        "Canada" => "CAD",
        _ => CURRENCY,
    }
}

/// Viagogo's standard guarantee, upgraded by wording in the description.
fn guarantee_for(description: Option<&str>) -> Guarantee {
    let text = description.unwrap_or("").to_lowercase();
    let mut coverage: BTreeMap<String, String> = GUARANTEE_COVERAGE
        .iter()
        .map(|(topic, detail)| (topic.to_string(), detail.to_string()))
        .collect();
    if text.contains("instant download") {
        coverage.insert(
            "instant_download".to_string(),
            "Instant download available".to_string(),
        );
    }

    let kind = if text.contains("100% guarantee") {
        GuaranteeKind::HundredPercent
    } else {
        GuaranteeKind::Full
    };
    Guarantee { kind, coverage }
}

fn status_from_text(text: &str) -> AvailabilityStatus {
    let text = text.to_lowercase();
    if text.contains("sold out") {
        AvailabilityStatus::SoldOut
    } else if text.contains("cancel") {
        AvailabilityStatus::Cancelled
    } else if text.contains("postponed") {
        AvailabilityStatus::Postponed
    } else if text.contains("presale") || text.contains("pre-sale") {
        AvailabilityStatus::Presale
    } else {
        AvailabilityStatus::from_internal(&text)
    }
}

/// Ticket count from a quantity badge, else from any span reading
/// "N tickets" or "N listings".
fn card_ticket_count(node: ElementRef) -> Option<u32> {
    parse_ticket_count(&try_selectors(node, QUANTITY_SELECTORS, None)).or_else(|| {
        let span = Selector::parse("span").ok()?;
        node.select(&span)
            .find_map(|s| parse_ticket_count(&own_text(&s)))
    })
}

#[async_trait]
impl PlatformClient for ViagogoClient {
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

    /// Currency follows the page or the event's country, and the buyer
    /// guarantee is attached.
    fn finalize(&self, mut event: NormalizedEvent) -> NormalizedEvent {
        let currency = currency_for_location(&event.location);
        let country = self.country_for(&event.location);
        if event.guarantee.is_none() {
            event.guarantee = Some(guarantee_for(event.description.as_deref()));
        }
        finalize_event(event, currency, country)
    }

    fn search_url(&self, criteria: &SearchCriteria) -> String {
        build_url(
            self.core.base_url(),
            "/secure/search",
            &[
                ("SearchTerm", criteria.q.clone()),
                ("Location", criteria.location_str().to_string()),
                ("FromDate", criteria.date_start.map(|d| d.to_string()).unwrap_or_default()),
                ("ToDate", criteria.date_end.map(|d| d.to_string()).unwrap_or_default()),
                ("Sort", "EventDate".to_string()),
                ("PageSize", criteria.per_page.min(MAX_PAGE_SIZE).to_string()),
            ],
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/event/{}", self.core.base_url(), event_id)
    }

    fn card_selectors(&self) -> &'static [&'static str] {
        CARD_SELECTORS
    }

    fn link_fallback_selector(&self) -> Option<&'static str> {
        Some(LINK_FALLBACK)
    }

    fn event_id_from_url(&self, url: &str) -> Option<String> {
        EVENT_ID.captures(url).map(|caps| caps[1].to_string())
    }

    fn event_name_from_url(&self, url: &str) -> Option<String> {
        EVENT_NAME
            .captures(url)
            .map(|caps| name_from_slug(&caps[1]))
            .filter(|name| !name.is_empty())
    }

    fn extract_event_from_node(&self, node: ElementRef<'_>) -> NormalizedEvent {
        let stats = self.core.stats();
        let mut event = NormalizedEvent::new(Platform::Viagogo);

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
        event.ticket_count = card_ticket_count(node);

        let status = try_selectors(node, STATUS_SELECTORS, None);
        if !status.is_empty() {
            event.availability = status_from_text(&status);
        }

        event
    }

    fn extract_event_details(&self, document: &Html, url: &str) -> NormalizedEvent {
        let root = document.root_element();
        let mut event = NormalizedEvent::new(Platform::Viagogo);
        event.url = Some(url.to_string());

        event.title = try_selectors(root, &["h1"], None);
        if event.title.is_empty() {
            event.title = clean_title(&try_selectors(root, &["title"], None));
        }

        let date = try_selectors(
            root,
            &[r#"span[class*="event-date"]"#, r#"div[class*="date"]"#, "time"],
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
            ],
            None,
        );
        event.location = try_selectors(
            root,
            &[r#"span[class*="location"]"#, "address", r#"div[class*="city"]"#],
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

        let category = try_selectors(
            root,
            &[r#"span[class*="category"]"#, r#"div[class*="genre"]"#],
            None,
        );
        event.category = (!category.is_empty()).then_some(category);

        let status = try_selectors(root, STATUS_SELECTORS, None);
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ViagogoClient {
        ViagogoClient::new(&Config::default(), RateGovernor::in_memory()).unwrap()
    }

    #[test]
    fn test_search_url() {
        let criteria = SearchCriteria::new("Coldplay")
            .with_location("London")
            .with_per_page(120);
        assert_eq!(
            client().search_url(&criteria),
            "https://www.viagogo.com/secure/search?SearchTerm=Coldplay&Location=London&Sort=EventDate&PageSize=50"
        );
    }

    #[test]
    fn test_ids_and_names_from_urls() {
        let client = client();
        assert_eq!(
            client.event_id_from_url("https://www.viagogo.com/event/154321"),
            Some("154321".to_string())
        );
        let slug_url = "https://www.viagogo.com/Concert-Tickets/Rock/coldplay-wembley/e-98765";
        assert_eq!(client.event_id_from_url(slug_url), Some("98765".to_string()));
        assert_eq!(
            client.event_name_from_url(slug_url),
            Some("Coldplay Wembley".to_string())
        );
        assert_eq!(client.event_id_from_url("https://www.viagogo.com/help"), None);
        assert_eq!(client.event_url("154321"), "https://www.viagogo.com/event/154321");
    }

    #[test]
    fn test_currency_for_location() {
        assert_eq!(currency_for_location("London, UK"), "GBP");
        assert_eq!(currency_for_location("Chicago, IL"), "USD");
        assert_eq!(currency_for_location("Toronto, ON, Canada"), "CAD");
        assert_eq!(currency_for_location("Paris, France"), "EUR");
        assert_eq!(currency_for_location(""), "EUR");
    }

    #[test]
    fn test_guarantee_wording() {
        let standard = guarantee_for(None);
        assert_eq!(standard.kind, GuaranteeKind::Full);
        assert_eq!(standard.coverage.len(), 4);

        let upgraded = guarantee_for(Some("Our 100% Guarantee. Instant download on most orders."));
        assert_eq!(upgraded.kind, GuaranteeKind::HundredPercent);
        assert_eq!(
            upgraded.coverage["instant_download"],
            "Instant download available"
        );
    }

    #[test]
    fn test_extract_cards() {
        let html = r#"
            <html><body>
              <div class="event-card">
                <h3>Coldplay: Music of the Spheres</h3>
                <a href="/Concert-Tickets/Rock/coldplay-wembley/e-98765">Tickets</a>
                <span class="event-date">14 Jun 2025, 19:30</span>
                <span class="venue">Wembley Stadium</span>
                <span class="location">London, UK</span>
                <span class="price">£1,150</span>
                <em>from £95</em>
                <span>212 tickets left</span>
              </div>
              <div class="event-card">
                <h3>Rammstein</h3>
                <a href="/event/5551">Tickets</a>
                <span class="location">Berlin, Germany</span>
                <span class="price">1.250 €</span>
                <span class="price">€89</span>
                <span class="status">Sold out</span>
              </div>
            </body></html>
        "#;
        let events = client().parse_search_results(html, 50);
        assert_eq!(events.len(), 2);

        let coldplay = &events[0];
        assert_eq!(coldplay.external_id.as_deref(), Some("98765"));
        assert_eq!(
            coldplay.event_date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2025-06-14 19:30"
        );
        assert_eq!(coldplay.country.as_deref(), Some("United Kingdom"));
        assert_eq!(coldplay.ticket_count, Some(212));
        let range = coldplay.price_range.clone().unwrap();
        assert_eq!((range.min, range.max), (95.0, 1150.0));
        assert_eq!(range.currency, "GBP");
        assert_eq!(coldplay.guarantee.as_ref().map(|g| g.kind), Some(GuaranteeKind::Full));

        let rammstein = &events[1];
        assert_eq!(rammstein.external_id.as_deref(), Some("5551"));
        assert_eq!(rammstein.country.as_deref(), Some("Germany"));
        let range = rammstein.price_range.clone().unwrap();
        assert_eq!((range.min, range.max), (89.0, 1250.0));
        assert_eq!(range.currency, "EUR");
        assert_eq!(rammstein.availability, AvailabilityStatus::SoldOut);
        assert!(!rammstein.available);
    }

    #[test]
    fn test_link_fallback() {
        let html = r#"
            <html><body>
              <li><a href="/Sports-Tickets/Football/arsenal-v-chelsea/e-4410"></a>
                  <time>2025-03-01 17:30</time><span class="venue">Emirates Stadium</span></li>
              <li><a href="/about">About</a></li>
            </body></html>
        "#;
        let events = client().parse_search_results(html, 50);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Arsenal V Chelsea");
        assert_eq!(events[0].external_id.as_deref(), Some("4410"));
        assert_eq!(events[0].venue, "Emirates Stadium");
        assert!(events[0].event_date.is_some());
    }

    #[test]
    fn test_event_details() {
        let html = r#"
            <html><head><title>Hamilton Tickets | viagogo</title></head><body>
              <div class="event-date">Jun 20, 2025 19:30</div>
              <div class="venue">Victoria Palace Theatre</div>
              <address>London, UK</address>
              <div class="description">Backed by our 100% Guarantee.</div>
              <span class="category">Theatre</span>
              <div class="listing"><span class="section">Stalls</span><span class="price">£180</span></div>
              <div class="listing"><span class="section">Upper Circle</span><span class="price">£65</span></div>
              <div class="listing"><span class="section">Dress Circle</span><span class="price">sold</span></div>
            </body></html>
        "#;
        let event = client()
            .parse_event_details(html, "https://www.viagogo.com/event/777")
            .unwrap();

        assert_eq!(event.title, "Hamilton");
        assert_eq!(event.external_id.as_deref(), Some("777"));
        assert_eq!(event.city.as_deref(), Some("London"));
        assert_eq!(event.category.as_deref(), Some("Theatre"));
        assert_eq!(event.ticket_count, Some(3));
        assert_eq!(event.price_entries.len(), 2);
        let range = event.price_range.unwrap();
        assert_eq!((range.min, range.max, range.currency.as_str()), (65.0, 180.0, "GBP"));
        assert_eq!(
            event.guarantee.map(|g| g.kind),
            Some(GuaranteeKind::HundredPercent)
        );
        assert_eq!(event.availability, AvailabilityStatus::Available);
    }
}
