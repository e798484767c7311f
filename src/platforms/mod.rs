//! Marketplace clients.
//!
//! Each platform implements [`PlatformClient`] on top of a composed
//! [`ScraperCore`]. The trait's provided methods carry the shared flow
//! (API first when credentials exist, HTML scraping otherwise); platforms
//! supply URLs, selectors and field parsing.
//!
//! Public operations never fail: problems are logged and surface as empty or
//! partial results.

pub mod core;
pub mod funzone;
pub mod registry;
pub mod stubhub;
pub mod tickpick;
pub mod viagogo;

pub use self::core::ScraperCore;
pub use funzone::FunZoneClient;
pub use registry::{build_rate_governor, create_client, PlatformRegistry};
pub use stubhub::StubHubClient;
pub use tickpick::TickPickClient;
pub use viagogo::ViagogoClient;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use self::core::finalize_event;
use crate::error::{Result, ScrapeError};
use crate::models::{
    EventTickets, NormalizedEvent, Platform, PriceEntry, SearchCriteria, Venue,
};
use crate::scrapers::extract::{element_text, try_selectors};
use crate::scrapers::normalize::{determine_country, parse_event_date_with};

/// A ticket marketplace client.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn core(&self) -> &ScraperCore;

    fn platform(&self) -> Platform {
        self.core().platform()
    }

    /// Key for rate limiting and logs.
    fn platform_name(&self) -> &'static str {
        self.platform().as_str()
    }

    /// Platform headers merged into outgoing requests.
    fn headers(&self) -> HashMap<String, String> {
        self.core().http().extra_headers().clone()
    }

    fn default_currency(&self) -> &'static str;

    fn default_country(&self) -> &'static str;

    /// Extra date layouts tried before the built-in list.
    fn date_formats(&self) -> &'static [&'static str] {
        &[]
    }

    fn search_url(&self, criteria: &SearchCriteria) -> String;

    fn event_url(&self, event_id: &str) -> String;

    /// Result-card selectors, most specific first.
    fn card_selectors(&self) -> &'static [&'static str];

    /// Anchors treated as results when no card matches.
    fn link_fallback_selector(&self) -> Option<&'static str> {
        None
    }

    fn event_id_from_url(&self, url: &str) -> Option<String>;

    fn event_name_from_url(&self, _url: &str) -> Option<String> {
        None
    }

    /// Fields of one result card.
    fn extract_event_from_node(&self, node: ElementRef<'_>) -> NormalizedEvent;

    /// Fields of an event detail page.
    fn extract_event_details(&self, document: &Html, url: &str) -> NormalizedEvent;

    /// Per-section prices from a detail page.
    fn extract_prices(&self, document: &Html) -> Vec<PriceEntry>;

    fn parse_date(&self, raw: &str) -> Option<NaiveDateTime> {
        parse_event_date_with(raw, self.date_formats())
    }

    fn country_for(&self, location: &str) -> String {
        determine_country(location, self.default_country())
    }

    /// Derive price range, city, country and availability.
    fn finalize(&self, event: NormalizedEvent) -> NormalizedEvent {
        let country = self.country_for(&event.location);
        finalize_event(event, self.default_currency(), country)
    }

    /// Up to `max_results` events from a search page. Falls back to result
    /// links when no card yields an event.
    fn extract_search_results(&self, document: &Html, max_results: usize) -> Vec<NormalizedEvent> {
        let mut events: Vec<NormalizedEvent> = Vec::new();
        let cards = self::core::find_cards(document, self.card_selectors(), self.core().rules());

        for card in cards {
            if events.len() >= max_results {
                break;
            }
            let event = self.finalize(self.extract_event_from_node(card));
            push_unique_event(&mut events, event);
        }

        if events.is_empty() {
            if let Some(selector) = self.link_fallback_selector().and_then(|s| Selector::parse(s).ok()) {
                for link in document.select(&selector) {
                    if events.len() >= max_results {
                        break;
                    }
                    let event = self.finalize(self.extract_event_from_link(link));
                    push_unique_event(&mut events, event);
                }
            }
        }

        debug!(platform = self.platform_name(), count = events.len(), "Extracted search results");
        events
    }

    /// Partial event from a bare result link and its parent's context.
    fn extract_event_from_link(&self, link: ElementRef<'_>) -> NormalizedEvent {
        let mut event = NormalizedEvent::new(self.platform());

        if let Some(href) = link.value().attr("href") {
            let url = self.core().absolute_url(href);
            event.external_id = self.event_id_from_url(&url);
            event.url = Some(url);
        }

        event.title = element_text(&link);
        if event.title.is_empty() {
            event.title = link.value().attr("title").unwrap_or("").trim().to_string();
        }
        if event.title.is_empty() {
            if let Some(name) = event.url.as_deref().and_then(|u| self.event_name_from_url(u)) {
                event.title = name;
            }
        }

        if let Some(parent) = link.parent().and_then(ElementRef::wrap) {
            let date = try_selectors(parent, &[r#"[class*="date"]"#, "time"], None);
            if !date.is_empty() {
                event.event_date = self.parse_date(&date);
                event.raw_date = Some(date);
            }
            event.venue = try_selectors(
                parent,
                &[r#"[class*="venue"]"#, r#"[class*="miesto"]"#],
                None,
            );
        }

        event
    }

    fn parse_search_results(&self, html: &str, max_results: usize) -> Vec<NormalizedEvent> {
        let document = Html::parse_document(html);
        self.extract_search_results(&document, max_results)
    }

    fn parse_event_details(&self, html: &str, url: &str) -> Option<NormalizedEvent> {
        let document = Html::parse_document(html);
        let mut event = self.extract_event_details(&document, url);
        if event.url.is_none() {
            event.url = Some(url.to_string());
        }
        if event.external_id.is_none() {
            event.external_id = self.event_id_from_url(url);
        }

        let event = self.finalize(event);
        if event.has_required_fields() {
            Some(event)
        } else {
            debug!(platform = self.platform_name(), url, "Event page missing a title");
            None
        }
    }

    /// Whether this platform has a native API.
    fn has_api(&self) -> bool {
        false
    }

    async fn api_search(&self, _criteria: &SearchCriteria) -> Result<Vec<NormalizedEvent>> {
        Err(ScrapeError::Config(format!(
            "{} has no API",
            self.platform_name()
        )))
    }

    async fn api_event(&self, _event_id: &str) -> Result<Option<NormalizedEvent>> {
        Err(ScrapeError::Config(format!(
            "{} has no API",
            self.platform_name()
        )))
    }

    /// Search via the API when configured, else (or on API failure) by
    /// scraping.
    async fn search_events(&self, criteria: &SearchCriteria) -> Vec<NormalizedEvent> {
        if !self.core().is_enabled() {
            debug!(platform = self.platform_name(), "Platform disabled");
            return Vec::new();
        }

        if self.has_api() && self.core().api_available() {
            match self.api_search(criteria).await {
                Ok(events) => return events,
                Err(e) => warn!(
                    platform = self.platform_name(),
                    error = %e,
                    "API search failed, falling back to scraping"
                ),
            }
        }

        self.scrape_search(criteria).await
    }

    /// Scrape the search page for `keyword`.
    async fn scrape_search_results(
        &self,
        keyword: &str,
        location: &str,
        max_results: usize,
    ) -> Vec<NormalizedEvent> {
        let criteria = SearchCriteria::new(keyword)
            .with_location(location)
            .with_per_page(max_results);
        self.scrape_search(&criteria).await
    }

    async fn scrape_search(&self, criteria: &SearchCriteria) -> Vec<NormalizedEvent> {
        let url = self.search_url(criteria);
        match self.core().fetch_page(&url, None).await {
            Some(html) => self.parse_search_results(&html, criteria.per_page),
            None => Vec::new(),
        }
    }

    /// Full event detail, API first when configured.
    async fn get_event(&self, event_id: &str) -> Option<NormalizedEvent> {
        if !self.core().is_enabled() {
            return None;
        }

        if self.has_api() && self.core().api_available() {
            match self.api_event(event_id).await {
                Ok(Some(event)) => return Some(event),
                Ok(None) => {}
                Err(e) => warn!(
                    platform = self.platform_name(),
                    event_id,
                    error = %e,
                    "API event fetch failed, falling back to scraping"
                ),
            }
        }

        let url = self.event_url(event_id);
        let mut event = self.scrape_event_details(&url).await?;
        if event.external_id.is_none() {
            event.external_id = Some(event_id.to_string());
        }
        Some(event)
    }

    async fn scrape_event_details(&self, url: &str) -> Option<NormalizedEvent> {
        let referer = self.core().base_url().to_string();
        let html = self.core().fetch_page(url, Some(&referer)).await?;
        self.parse_event_details(&html, url)
    }

    /// Venue record. Platforms without venue pages return a placeholder.
    async fn get_venue(&self, venue_id: &str) -> Venue {
        Venue::placeholder(self.platform(), venue_id, self.default_country())
    }

    async fn get_event_tickets(&self, event_id: &str) -> EventTickets {
        match self.get_event(event_id).await {
            Some(event) => EventTickets::from_event(event_id, &event),
            None => EventTickets::empty(event_id),
        }
    }

    fn set_delay_range(&self, min_secs: f64, max_secs: f64) {
        self.core().http().set_delay_range(min_secs, max_secs);
    }
}

fn push_unique_event(events: &mut Vec<NormalizedEvent>, event: NormalizedEvent) {
    if !event.has_required_fields() {
        return;
    }
    let duplicate = events
        .iter()
        .any(|e| e.title == event.title && e.url == event.url);
    if !duplicate {
        events.push(event);
    }
}
