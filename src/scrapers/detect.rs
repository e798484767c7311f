//! Heuristic selector discovery.
//!
//! Last-resort fallback when a platform's known selectors stop matching. The
//! rule table is plain data, loadable from the `[detection]` config section.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What kind of content to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Event,
    Price,
    Date,
    Venue,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Event => "event",
            SelectorKind::Price => "price",
            SelectorKind::Date => "date",
            SelectorKind::Venue => "venue",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "event" => Some(SelectorKind::Event),
            "price" => Some(SelectorKind::Price),
            "date" => Some(SelectorKind::Date),
            "venue" => Some(SelectorKind::Venue),
            _ => None,
        }
    }
}

/// Heuristic rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRules {
    /// Candidate selectors for result containers.
    pub event_containers: Vec<String>,
    /// Substrings marking an element's own text as a price.
    pub price_indicators: Vec<String>,
    /// Regexes marking an element's own text as a date or time.
    pub date_patterns: Vec<String>,
    /// Class-name substrings marking venue elements.
    pub venue_keywords: Vec<String>,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            event_containers: to_strings(&[
                r#"div[class*="event"]"#,
                r#"article[class*="event"]"#,
                r#"div[class*="listing"]"#,
                r#"div[class*="card"]"#,
                r#"div[class*="result"]"#,
                r#"div[class*="item"]"#,
            ]),
            price_indicators: to_strings(&["$", "€", "£", "USD", "EUR", "GBP", "price", "cost"]),
            date_patterns: to_strings(&[
                r"\d{1,2}/\d{1,2}/\d{4}",
                r"\d{4}-\d{2}-\d{2}",
                r"\w+\s+\d{1,2},\s+\d{4}",
                r"\d{1,2}:\d{2}",
            ]),
            venue_keywords: to_strings(&[
                "venue", "location", "place", "stadium", "theater", "hall", "center", "arena",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Compound class selector for an element, e.g. `.price.large`.
pub fn class_selector(element: &ElementRef) -> Option<String> {
    let classes: Vec<&str> = element
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();
    if classes.is_empty() {
        None
    } else {
        Some(format!(".{}", classes.join(".")))
    }
}

/// Text held directly by an element, excluding descendants.
pub fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect()
}

fn push_unique(selectors: &mut Vec<String>, selector: String) {
    if !selectors.contains(&selector) {
        selectors.push(selector);
    }
}

fn elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.root_element().descendants().filter_map(ElementRef::wrap)
}

/// Selectors present in `document` that likely hold content of `kind`, in
/// discovery order without duplicates.
pub fn detect_selectors(document: &Html, kind: SelectorKind, rules: &DetectionRules) -> Vec<String> {
    let mut selectors = Vec::new();

    match kind {
        SelectorKind::Event => {
            for candidate in &rules.event_containers {
                match Selector::parse(candidate) {
                    Ok(selector) if document.select(&selector).next().is_some() => {
                        push_unique(&mut selectors, candidate.clone());
                    }
                    Ok(_) => {}
                    Err(_) => debug!(selector = %candidate, "Skipping invalid container selector"),
                }
            }
        }
        SelectorKind::Price => {
            for element in elements(document) {
                let text = own_text(&element);
                if rules.price_indicators.iter().any(|i| text.contains(i.as_str())) {
                    if let Some(selector) = class_selector(&element) {
                        push_unique(&mut selectors, selector);
                    }
                }
            }
        }
        SelectorKind::Date => {
            let patterns: Vec<Regex> = rules
                .date_patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect();
            for element in elements(document) {
                let text = own_text(&element);
                if patterns.iter().any(|p| p.is_match(&text)) {
                    if let Some(selector) = class_selector(&element) {
                        push_unique(&mut selectors, selector);
                    }
                }
            }
        }
        SelectorKind::Venue => {
            for element in elements(document) {
                let has_keyword = element.value().classes().any(|class| {
                    rules
                        .venue_keywords
                        .iter()
                        .any(|keyword| class.contains(keyword.as_str()))
                });
                if has_keyword {
                    if let Some(selector) = class_selector(&element) {
                        push_unique(&mut selectors, selector);
                    }
                }
            }
        }
    }

    debug!(kind = kind.as_str(), found = selectors.len(), "Detected selectors");
    selectors
}
