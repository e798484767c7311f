//! StubHub: catalog API when credentials are configured, HTML otherwise.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;

use super::core::{
    build_url, clean_title, listing_count, listing_prices, parse_ticket_count, price_texts,
    ScraperCore,
};
use super::PlatformClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    AvailabilityStatus, NormalizedEvent, Platform, PriceEntry, PriceRange, SearchCriteria,
};
use crate::rate_limit::RateGovernor;
use crate::scrapers::extract::{extract_json_ld, extract_price_with_fallbacks, try_selectors};
use crate::scrapers::normalize::parse_event_date;

pub const BASE_URL: &str = "https://www.stubhub.com";
pub const API_URL: &str = "https://api.stubhub.com/sellers/search/events/v3";
pub const SANDBOX_API_URL: &str = "https://api.stubhubsandbox.com/sellers/search/events/v3";

const CURRENCY: &str = "USD";
const COUNTRY: &str = "United States";
const MAX_ROWS: usize = 100;

const CARD_SELECTORS: &[&str] = &[".EventCard", ".event-card", ".SearchResultCard", ".search-result"];
const TITLE_SELECTORS: &[&str] = &[".event-name", "h3", "h4", ".title", "a"];
const LINK_SELECTORS: &[&str] = &[r#"a[href*="/event/"]"#];
const DATE_SELECTORS: &[&str] = &[".date", "time", ".event-date"];
const VENUE_SELECTORS: &[&str] = &[".venue", ".venue-name"];
const LOCATION_SELECTORS: &[&str] = &[".location", r#"[class*="city"]"#];
const PRICE_SELECTORS: &[&str] = &[r#"[class*="price"]"#];
const AVAILABILITY_SELECTORS: &[&str] = &[r#"[class*="available"]"#, r#"[class*="tickets"]"#];

const LISTING_ROWS: &[&str] = &[r#"div[class*="ticket-listing"]"#, r#"div[class*="listing"]"#];
const LISTING_PRICES: &[&str] = &[".price", ".ticket-price", ".listing-price", "[data-price]", r#"[class*="price"]"#];
const LISTING_SECTIONS: &[&str] = &[r#"[class*="section"]"#, r#"[class*="zone"]"#];

const DATE_FORMATS: &[&str] = &["%a, %b %d, %Y %I:%M %p", "%a, %b %d %Y %I:%M %p"];

static EVENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/event/(\d+)").unwrap());

pub struct StubHubClient {
    core: ScraperCore,
}

impl StubHubClient {
    pub fn new(config: &Config, rate: RateGovernor) -> Result<Self> {
        Ok(Self {
            core: ScraperCore::new(Platform::StubHub, config, BASE_URL, HashMap::new(), rate)?,
        })
    }

    /// Catalog API root: the configured override, else the sandbox or
    /// production host.
    fn api_base(&self) -> String {
        let config = self.core.config();
        let default = if config.sandbox { SANDBOX_API_URL } else { API_URL };
        config
            .api_base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn api_headers(&self) -> HashMap<String, String> {
        let config = self.core.config();
        let mut headers = HashMap::from([
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]);
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert("Authorization".to_string(), format!("Bearer {}", key));
        }
        if let Some(token) = config.app_token.as_deref().filter(|t| !t.is_empty()) {
            headers.insert("X-SH-Application-Token".to_string(), token.to_string());
        }
        headers
    }

    fn api_search_params(criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
        vec![
            ("name", criteria.q.clone()),
            ("city", criteria.location_str().to_string()),
            ("minDate", criteria.date_start.map(|d| d.to_string()).unwrap_or_default()),
            ("maxDate", criteria.date_end.map(|d| d.to_string()).unwrap_or_default()),
            ("rows", criteria.per_page.min(MAX_ROWS).to_string()),
            ("start", "0".to_string()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }

    /// Map one catalog API event onto the normalized shape.
    fn event_from_api(&self, data: &Value) -> NormalizedEvent {
        let mut event = NormalizedEvent::new(Platform::StubHub);
        let text = |v: &Value| v.as_str().map(|s| s.trim().to_string());

        event.external_id = match &data["id"] {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        event.title = text(&data["name"]).unwrap_or_default();
        event.description = text(&data["description"]).filter(|d| !d.is_empty());

        let raw_date = text(&data["eventDateLocal"])
            .or_else(|| text(&data["eventDateUTC"]))
            .or_else(|| text(&data["date"]));
        if let Some(raw) = raw_date {
            event.event_date = parse_api_date(&raw);
            event.raw_date = Some(raw);
        }

        let venue = &data["venue"];
        event.venue = text(&venue["name"]).unwrap_or_default();
        let city = text(&venue["city"]).unwrap_or_default();
        let state = text(&venue["state"]).unwrap_or_default();
        event.location = [city.as_str(), state.as_str()]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

        let info = &data["ticketInfo"];
        let currency = text(&info["currencyCode"]).unwrap_or_else(|| CURRENCY.to_string());
        let bounds: Vec<f64> = ["minListPrice", "maxListPrice", "minPrice", "maxPrice"]
            .iter()
            .filter_map(|key| info[*key].as_f64())
            .collect();
        event.price_range = PriceRange::from_values(&bounds, &currency);
        event.ticket_count = info["totalTickets"]
            .as_u64()
            .or_else(|| info["totalListings"].as_u64())
            .and_then(|n| u32::try_from(n).ok());

        if let Some(status) = text(&data["status"]) {
            let status = match status.to_lowercase().as_str() {
                "active" => AvailabilityStatus::Available,
                other => AvailabilityStatus::from_internal(other),
            };
            event.availability = status;
        }

        event.url = text(&data["webURI"])
            .or_else(|| text(&data["url"]))
            .map(|u| self.core.absolute_url(&u));

        self.finalize(event)
    }
}

/// API timestamps come as RFC 3339 or as `2024-12-25T19:30:00-0800`.
fn parse_api_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    raw.get(..19)
        .and_then(|head| NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| parse_event_date(raw))
}

fn json_ld_status(status: &str) -> AvailabilityStatus {
    if status.ends_with("EventCancelled") {
        AvailabilityStatus::Cancelled
    } else if status.ends_with("EventPostponed") || status.ends_with("EventRescheduled") {
        AvailabilityStatus::Postponed
    } else {
        AvailabilityStatus::Unknown
    }
}

#[async_trait]
impl PlatformClient for StubHubClient {
    fn core(&self) -> &ScraperCore {
        &self.core
    }

    fn headers(&self) -> HashMap<String, String> {
        self.api_headers()
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

    fn search_url(&self, criteria: &SearchCriteria) -> String {
        build_url(
            self.core.base_url(),
            "/secure/search",
            &[
                ("q", criteria.q.clone()),
                ("city", criteria.location_str().to_string()),
                ("start_date", criteria.date_start.map(|d| d.to_string()).unwrap_or_default()),
                ("end_date", criteria.date_end.map(|d| d.to_string()).unwrap_or_default()),
                ("sort", "event_date_asc".to_string()),
                ("rows", criteria.per_page.min(MAX_ROWS).to_string()),
            ],
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/event/{}", self.core.base_url(), event_id)
    }

    fn card_selectors(&self) -> &'static [&'static str] {
        CARD_SELECTORS
    }

    fn event_id_from_url(&self, url: &str) -> Option<String> {
        EVENT_ID.captures(url).map(|caps| caps[1].to_string())
    }

    fn extract_event_from_node(&self, node: ElementRef<'_>) -> NormalizedEvent {
        let stats = self.core.stats();
        let mut event = NormalizedEvent::new(Platform::StubHub);

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
        event.prices = price_texts(node, PRICE_SELECTORS, &[]);
        event.ticket_count =
            parse_ticket_count(&try_selectors(node, AVAILABILITY_SELECTORS, None));

        event
    }

    fn extract_event_details(&self, document: &Html, url: &str) -> NormalizedEvent {
        let root = document.root_element();
        let mut event = NormalizedEvent::new(Platform::StubHub);
        event.url = Some(url.to_string());

        if let Some(data) = extract_json_ld(document, Some("Event")).into_iter().next() {
            let text = |v: &Value| v.as_str().map(|s| s.trim().to_string());
            event.title = text(&data["name"]).unwrap_or_default();
            event.description = text(&data["description"]).filter(|d| !d.is_empty());
            if let Some(start) = text(&data["startDate"]) {
                event.event_date = parse_api_date(&start);
                event.raw_date = Some(start);
            }
            event.venue = text(&data["location"]["name"]).unwrap_or_default();
            let address = &data["location"]["address"];
            event.location = ["addressLocality", "addressRegion"]
                .iter()
                .filter_map(|key| text(&address[*key]))
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            if let Some(status) = text(&data["eventStatus"]) {
                event.availability = json_ld_status(&status);
            }
        }

        if event.title.is_empty() {
            event.title = try_selectors(root, &[r#"h1[class*="event-title"]"#, "h1", ".event-title"], None);
        }
        if event.title.is_empty() {
            event.title = clean_title(&try_selectors(root, &["title"], None));
        }
        if event.venue.is_empty() {
            event.venue = try_selectors(root, &[".venue-name", ".venue", r#"[class*="venue"]"#], None);
        }
        if event.raw_date.is_none() {
            let date = try_selectors(root, &[r#"[class*="event-date"]"#, r#"[class*="date"]"#, "time"], None);
            if !date.is_empty() {
                event.event_date = self.parse_date(&date);
                event.raw_date = Some(date);
            }
        }
        if event.location.is_empty() {
            event.location = try_selectors(root, &[r#"[class*="location"]"#, "address"], None);
        }
        if event.description.is_none() {
            let description =
                try_selectors(root, &[r#"div[class*="description"]"#, r#"div[class*="event-info"]"#], None);
            event.description = (!description.is_empty()).then_some(description);
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

    fn has_api(&self) -> bool {
        true
    }

    async fn api_search(&self, criteria: &SearchCriteria) -> Result<Vec<NormalizedEvent>> {
        let params = Self::api_search_params(criteria);
        let response = self
            .core
            .http()
            .api_request(&self.api_base(), &params, &self.api_headers())
            .await?;

        let events = response["events"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| self.event_from_api(item))
                    .filter(NormalizedEvent::has_required_fields)
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }

    async fn api_event(&self, event_id: &str) -> Result<Option<NormalizedEvent>> {
        let url = format!("{}/events/{}", self.api_base(), urlencoding::encode(event_id));
        let response = self
            .core
            .http()
            .api_request(&url, &[], &self.api_headers())
            .await?;

        let mut event = self.event_from_api(&response);
        if event.external_id.is_none() {
            event.external_id = Some(event_id.to_string());
        }
        Ok(event.has_required_fields().then_some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use crate::models::SectionType;

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <div class="EventCard">
            <h3 class="event-name">Los Angeles Lakers vs Boston Celtics</h3>
            <a href="/lakers-tickets-12-25-2024/event/151234567/">View tickets</a>
            <span class="date">Dec 25, 2024 7:30 PM</span>
            <span class="venue">Crypto.com Arena</span>
            <span class="location">Los Angeles, CA</span>
            <div class="price-box"><span class="price">$89.00</span></div>
            <div class="price-box"><span class="price">$1,250.00</span></div>
            <span class="available">142 tickets available</span>
          </div>
          <div class="EventCard">
            <h3 class="event-name">Hamilton</h3>
            <a href="https://www.stubhub.com/hamilton-tickets/event/99887766">Buy</a>
            <span class="date">2025-01-10 20:00</span>
          </div>
          <div class="EventCard"><span class="venue">No title here</span></div>
        </body></html>
    "#;

    fn client() -> StubHubClient {
        StubHubClient::new(&Config::default(), RateGovernor::in_memory()).unwrap()
    }

    #[test]
    fn test_search_url() {
        let criteria = SearchCriteria::new("Lakers")
            .with_location("Los Angeles")
            .with_per_page(500);
        let url = client().search_url(&criteria);
        assert_eq!(
            url,
            "https://www.stubhub.com/secure/search?q=Lakers&city=Los+Angeles&sort=event_date_asc&rows=100"
        );
    }

    #[test]
    fn test_event_id_from_url() {
        let client = client();
        assert_eq!(
            client.event_id_from_url("https://www.stubhub.com/x/event/151234567/"),
            Some("151234567".to_string())
        );
        assert_eq!(client.event_id_from_url("https://www.stubhub.com/about"), None);
    }

    #[test]
    fn test_extract_search_results() {
        let events = client().parse_search_results(SEARCH_PAGE, 50);
        assert_eq!(events.len(), 2);

        let lakers = &events[0];
        assert_eq!(lakers.title, "Los Angeles Lakers vs Boston Celtics");
        assert_eq!(lakers.external_id.as_deref(), Some("151234567"));
        assert_eq!(
            lakers.url.as_deref(),
            Some("https://www.stubhub.com/lakers-tickets-12-25-2024/event/151234567/")
        );
        let date = lakers.event_date.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2024-12-25 19:30");
        assert_eq!(lakers.venue, "Crypto.com Arena");
        assert_eq!(lakers.city.as_deref(), Some("Los Angeles"));
        assert_eq!(lakers.country.as_deref(), Some("United States"));
        let range = lakers.price_range.clone().unwrap();
        assert_eq!((range.min, range.max), (89.0, 1250.0));
        assert_eq!(range.currency, "USD");
        assert_eq!(lakers.ticket_count, Some(142));
        assert!(lakers.available);

        let hamilton = &events[1];
        assert_eq!(hamilton.external_id.as_deref(), Some("99887766"));
        assert!(hamilton.price_range.is_none());
        assert!(!hamilton.available);
    }

    #[test]
    fn test_search_results_respect_limit() {
        assert_eq!(client().parse_search_results(SEARCH_PAGE, 1).len(), 1);
    }

    #[test]
    fn test_event_details_from_json_ld() {
        let html = r#"
            <html><head>
              <script type="application/ld+json">
                {"@context": "https://schema.org", "@type": "Event",
                 "name": "Taylor Swift | The Eras Tour",
                 "description": "Stadium show",
                 "startDate": "2024-08-15T19:00:00-04:00",
                 "location": {"@type": "Place", "name": "MetLife Stadium",
                              "address": {"addressLocality": "East Rutherford", "addressRegion": "NJ"}},
                 "offers": [{"price": 450.0, "priceCurrency": "USD", "name": "Floor A"},
                            {"price": "199.50", "priceCurrency": "USD", "name": "Upper 320"}]}
              </script>
            </head><body><h1>ignored</h1></body></html>
        "#;
        let event = client()
            .parse_event_details(html, "https://www.stubhub.com/eras/event/123")
            .unwrap();

        assert_eq!(event.title, "Taylor Swift | The Eras Tour");
        assert_eq!(event.external_id.as_deref(), Some("123"));
        assert_eq!(event.venue, "MetLife Stadium");
        assert_eq!(event.city.as_deref(), Some("East Rutherford"));
        assert_eq!(event.country.as_deref(), Some("United States"));
        assert_eq!(
            event.event_date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-08-15 19:00"
        );
        assert_eq!(event.price_entries.len(), 2);
        assert_eq!(event.price_entries[0].section_type, SectionType::Floor);
        assert_eq!(event.price_entries[1].section_type, SectionType::Upper);
        let range = event.price_range.unwrap();
        assert_eq!((range.min, range.max), (199.5, 450.0));
    }

    #[test]
    fn test_event_details_from_selectors() {
        let html = r#"
            <html><head><title>Hamilton Tickets | StubHub</title></head><body>
              <span class="event-date">Jan 10, 2025 8:00 PM</span>
              <div class="venue">Richard Rodgers Theatre</div>
              <address>New York, NY</address>
              <div class="ticket-listing"><span class="section">Orchestra</span><span class="price">$325</span></div>
              <div class="ticket-listing"><span class="section">Balcony</span><span class="price">$149</span></div>
            </body></html>
        "#;
        let client = client();
        let event = client
            .parse_event_details(html, "https://www.stubhub.com/event/42")
            .unwrap();

        assert_eq!(event.title, "Hamilton");
        assert_eq!(event.venue, "Richard Rodgers Theatre");
        assert_eq!(event.city.as_deref(), Some("New York"));
        assert_eq!(event.ticket_count, Some(2));
        let range = event.price_range.unwrap();
        assert_eq!((range.min, range.max), (149.0, 325.0));

        let prices = client.extract_prices(&Html::parse_document(html));
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].section, "Orchestra");
        assert_eq!(prices[0].section_type, SectionType::Lower);
        assert_eq!(prices[1].section_type, SectionType::Upper);
    }

    #[test]
    fn test_event_details_without_title() {
        let html = "<html><body><p>Nothing useful</p></body></html>";
        assert!(client().parse_event_details(html, "https://www.stubhub.com/event/1").is_none());
    }

    #[test]
    fn test_event_from_api() {
        let data = serde_json::json!({
            "id": 103489201,
            "name": "Lakers vs Celtics",
            "eventDateLocal": "2024-12-25T19:30:00-0800",
            "status": "ACTIVE",
            "webURI": "lakers-celtics/event/103489201/",
            "venue": {"name": "Crypto.com Arena", "city": "Los Angeles", "state": "CA"},
            "ticketInfo": {"minListPrice": 89.5, "maxListPrice": 1200.0, "totalTickets": 340, "currencyCode": "USD"}
        });
        let event = client().event_from_api(&data);

        assert_eq!(event.external_id.as_deref(), Some("103489201"));
        assert_eq!(
            event.event_date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-12-25 19:30"
        );
        assert_eq!(event.city.as_deref(), Some("Los Angeles"));
        assert_eq!(event.ticket_count, Some(340));
        assert_eq!(event.availability, AvailabilityStatus::Available);
        assert_eq!(
            event.url.as_deref(),
            Some("https://www.stubhub.com/lakers-celtics/event/103489201/")
        );
        let range = event.price_range.unwrap();
        assert_eq!((range.min, range.max), (89.5, 1200.0));
    }

    #[test]
    fn test_api_headers() {
        let mut config = Config::default();
        config.platforms.insert(
            "stubhub".to_string(),
            PlatformConfig {
                api_key: Some("key".into()),
                app_token: Some("token".into()),
                ..Default::default()
            },
        );
        let client = StubHubClient::new(&config, RateGovernor::in_memory()).unwrap();
        let headers = client.headers();
        assert_eq!(headers["Authorization"], "Bearer key");
        assert_eq!(headers["X-SH-Application-Token"], "token");
        assert!(client.core().api_available());
    }

    #[test]
    fn test_api_base_follows_sandbox_flag() {
        assert_eq!(client().api_base(), API_URL);

        let with = |settings: PlatformConfig| {
            let mut config = Config::default();
            config.platforms.insert("stubhub".to_string(), settings);
            StubHubClient::new(&config, RateGovernor::in_memory()).unwrap()
        };
        let sandbox = with(PlatformConfig {
            sandbox: true,
            ..Default::default()
        });
        assert_eq!(sandbox.api_base(), SANDBOX_API_URL);

        let overridden = with(PlatformConfig {
            sandbox: true,
            api_base_url: Some("http://127.0.0.1:9000/catalog/".into()),
            ..Default::default()
        });
        assert_eq!(overridden.api_base(), "http://127.0.0.1:9000/catalog");
    }

    #[test]
    fn test_api_date_formats() {
        assert!(parse_api_date("2024-12-25T19:30:00Z").is_some());
        assert!(parse_api_date("2024-12-25T19:30:00-0800").is_some());
        assert!(parse_api_date("TBA").is_none());
    }
}
