//! Normalized event listings produced by platform clients.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::{AvailabilityStatus, Platform, SectionType};

/// Aggregated price bounds for a listing.
///
/// Invariant: `min <= max`. A single observed price gives `min == max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

impl PriceRange {
    /// Build a range from numeric prices. Returns None for an empty set.
    pub fn from_values(values: &[f64], currency: &str) -> Option<Self> {
        let mut iter = values.iter().copied().filter(|v| v.is_finite());
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self {
            min,
            max,
            currency: currency.to_string(),
        })
    }
}

/// A single priced offer, usually one seating section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub price: f64,
    pub currency: String,
    pub section: String,
    pub section_type: SectionType,
}

impl PriceEntry {
    pub fn new(price: f64, currency: &str, section: &str) -> Self {
        Self {
            price,
            currency: currency.to_string(),
            section: section.to_string(),
            section_type: SectionType::classify(section),
        }
    }
}

/// Strength of a resale marketplace's buyer guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeKind {
    Full,
    HundredPercent,
}

/// Buyer guarantee attached to a listing: its kind and what it covers,
/// keyed by topic (`authenticity`, `delivery`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantee {
    pub kind: GuaranteeKind,
    pub coverage: BTreeMap<String, String>,
}

/// Event listing normalized across marketplaces.
///
/// Built up field by field during extraction; any field that could not be
/// recovered stays empty rather than failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub platform: Platform,
    /// Marketplace's own event identifier.
    pub external_id: Option<String>,
    pub title: String,
    pub venue: String,
    /// Free-form location text as shown on the page.
    pub location: String,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Parsed event start. None when the raw date was missing or unparsable.
    pub event_date: Option<NaiveDateTime>,
    /// Date text exactly as scraped.
    pub raw_date: Option<String>,
    pub price_range: Option<PriceRange>,
    pub available: bool,
    pub availability: AvailabilityStatus,
    pub ticket_count: Option<u32>,
    /// Raw price strings as they appeared in the listing.
    pub prices: Vec<String>,
    /// Structured per-section prices (detail pages, JSON-LD offers).
    pub price_entries: Vec<PriceEntry>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Listed prices already include all fees.
    #[serde(default)]
    pub no_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantee: Option<Guarantee>,
    /// Absolute URL of the listing on the marketplace.
    pub url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl NormalizedEvent {
    /// Create an empty event for a platform, to be filled during extraction.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            external_id: None,
            title: String::new(),
            venue: String::new(),
            location: String::new(),
            city: None,
            country: None,
            event_date: None,
            raw_date: None,
            price_range: None,
            available: false,
            availability: AvailabilityStatus::Unknown,
            ticket_count: None,
            prices: Vec::new(),
            price_entries: Vec::new(),
            description: None,
            category: None,
            no_fee: false,
            guarantee: None,
            url: None,
            scraped_at: Utc::now(),
        }
    }

    /// Whether the required fields survived extraction.
    pub fn has_required_fields(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Fill the price range from structured entries when none was derived yet.
    pub fn fill_range_from_entries(&mut self, default_currency: &str) {
        if self.price_range.is_some() || self.price_entries.is_empty() {
            return;
        }
        let values: Vec<f64> = self.price_entries.iter().map(|e| e.price).collect();
        let currency = self
            .price_entries
            .first()
            .map(|e| e.currency.as_str())
            .unwrap_or(default_currency);
        self.price_range = PriceRange::from_values(&values, currency);
    }

    /// Derive availability from the collected counts and prices.
    pub fn settle_availability(&mut self) {
        if self.availability == AvailabilityStatus::Unknown {
            let has_prices = self.price_range.is_some() || !self.price_entries.is_empty();
            self.availability = AvailabilityStatus::infer(self.ticket_count, has_prices);
        }
        self.available = self.availability == AvailabilityStatus::Available;
    }
}

/// Ticket summary for a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTickets {
    pub event_id: String,
    pub total_listings: usize,
    pub price_range: Option<PriceRange>,
    pub prices: Vec<PriceEntry>,
}

impl EventTickets {
    /// Summary for an event that could not be loaded.
    pub fn empty(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            total_listings: 0,
            price_range: None,
            prices: Vec::new(),
        }
    }

    pub fn from_event(event_id: &str, event: &NormalizedEvent) -> Self {
        Self {
            event_id: event_id.to_string(),
            total_listings: event
                .ticket_count
                .map(|c| c as usize)
                .unwrap_or(event.price_entries.len()),
            price_range: event.price_range.clone(),
            prices: event.price_entries.clone(),
        }
    }
}
