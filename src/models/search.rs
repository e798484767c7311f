//! Search criteria and per-call scrape requests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Default number of results requested per search.
pub const DEFAULT_PER_PAGE: usize = 50;

/// Inbound search parameters from ingestion collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text keyword (team, artist, event name).
    pub q: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl SearchCriteria {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            location: None,
            date_start: None,
            date_end: None,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        self.location = (!location.trim().is_empty()).then_some(location);
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    /// Location as a plain string, empty when absent.
    pub fn location_str(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

/// HTTP method for a scrape request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
}

/// A single outbound fetch. Created per call, consumed once.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub platform: Platform,
    pub method: RequestMethod,
    pub body: Option<String>,
    /// Referer to present, switching Sec-Fetch-Site to same-origin.
    pub referer: Option<String>,
}

impl ScrapeRequest {
    pub fn get(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            platform,
            method: RequestMethod::Get,
            body: None,
            referer: None,
        }
    }

    pub fn post(platform: Platform, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Post,
            body: Some(body.into()),
            ..Self::get(platform, url)
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}
