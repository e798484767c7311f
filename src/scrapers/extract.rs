//! Structured extraction from marketplace HTML.
//!
//! Every extraction site supplies an ordered list of candidate selectors,
//! most specific first, so markup drift degrades to a more generic match
//! instead of an empty field.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info};

use super::detect::{detect_selectors, own_text, DetectionRules, SelectorKind};
use super::normalize::{collapse_whitespace, extract_numeric_price, map_currency_symbol};
use crate::models::PriceEntry;

static SYMBOL_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([€$£¥])\s*\d[\d.,]*").unwrap());

/// Whitespace-collapsed text content of an element.
pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// First selector in `selectors` that matches under `root`, with its value.
///
/// Returns the index of the matching selector and either the node's text or
/// the named attribute. Invalid selectors are skipped. A match whose
/// attribute is missing yields an empty value rather than falling through.
pub fn try_selectors_with_match(
    root: ElementRef,
    selectors: &[&str],
    attribute: Option<&str>,
) -> Option<(usize, String)> {
    for (index, candidate) in selectors.iter().enumerate() {
        let Ok(selector) = Selector::parse(candidate) else {
            debug!(selector = %candidate, "Skipping invalid selector");
            continue;
        };
        if let Some(node) = root.select(&selector).next() {
            let value = match attribute {
                Some(attr) => node.value().attr(attr).unwrap_or("").trim().to_string(),
                None => element_text(&node),
            };
            return Some((index, value));
        }
    }
    None
}

/// Value of the first matching selector, or an empty string.
pub fn try_selectors(root: ElementRef, selectors: &[&str], attribute: Option<&str>) -> String {
    try_selectors_with_match(root, selectors, attribute)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

fn type_matches(item: &Value, type_filter: Option<&str>) -> bool {
    let Some(declared) = item.get("@type") else {
        return false;
    };
    let Some(wanted) = type_filter else {
        return true;
    };
    match declared {
        Value::String(s) => s == wanted,
        Value::Array(types) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

/// Parsed JSON-LD objects whose `@type` equals `type_filter` (all typed
/// objects when `None`), in document order.
///
/// Top-level arrays and `@graph` containers are flattened. Malformed blocks
/// are skipped.
pub fn extract_json_ld(document: &Html, type_filter: Option<&str>) -> Vec<Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let json: Value = match serde_json::from_str(raw.trim()) {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "Failed to parse JSON-LD data");
                continue;
            }
        };

        let items = match json {
            Value::Array(items) => items,
            Value::Object(ref obj) if !obj.contains_key("@type") => match obj.get("@graph") {
                Some(Value::Array(graph)) => graph.clone(),
                _ => Vec::new(),
            },
            other => vec![other],
        };

        found.extend(items.into_iter().filter(|item| type_matches(item, type_filter)));
    }
    found
}

fn json_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => extract_numeric_price(s),
        _ => None,
    }
}

/// Price entries from the `offers` of JSON-LD events.
pub fn json_ld_offer_prices(events: &[Value]) -> Vec<PriceEntry> {
    let mut prices = Vec::new();
    for event in events {
        let offers: Vec<&Value> = match event.get("offers") {
            Some(Value::Array(offers)) => offers.iter().collect(),
            Some(offer @ Value::Object(_)) => vec![offer],
            _ => continue,
        };

        for offer in offers {
            let currency = offer
                .get("priceCurrency")
                .and_then(Value::as_str)
                .unwrap_or("USD");
            let section = offer.get("name").and_then(Value::as_str).unwrap_or("General");

            if let Some(price) = offer.get("price").and_then(json_price) {
                prices.push(PriceEntry::new(price, currency, section));
                continue;
            }
            for key in ["lowPrice", "highPrice"] {
                if let Some(price) = offer.get(key).and_then(json_price) {
                    prices.push(PriceEntry::new(price, currency, section));
                }
            }
        }
    }
    prices
}

/// Price entries from elements whose class looks price-related.
pub fn detected_prices(document: &Html, rules: &DetectionRules) -> Vec<PriceEntry> {
    let mut prices = Vec::new();
    for candidate in detect_selectors(document, SelectorKind::Price, rules) {
        let Ok(selector) = Selector::parse(&candidate) else {
            continue;
        };
        for node in document.select(&selector) {
            let text = own_text(&node);
            if let Some(caps) = SYMBOL_PRICE.captures(&text) {
                if let Some(price) = extract_numeric_price(&caps[0]) {
                    prices.push(PriceEntry::new(
                        price,
                        map_currency_symbol(&caps[1]),
                        "General",
                    ));
                }
            }
        }
    }
    prices
}

/// Prices via JSON-LD offers, then heuristic selectors, then the platform's
/// own extractor.
pub fn extract_price_with_fallbacks<F>(
    document: &Html,
    rules: &DetectionRules,
    platform_prices: F,
) -> Vec<PriceEntry>
where
    F: FnOnce(&Html) -> Vec<PriceEntry>,
{
    let prices = json_ld_offer_prices(&extract_json_ld(document, Some("Event")));
    if !prices.is_empty() {
        return prices;
    }

    let prices = detected_prices(document, rules);
    if !prices.is_empty() {
        return prices;
    }

    platform_prices(document)
}

/// Hit and miss counts for one selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorHits {
    pub successful: u64,
    pub failed: u64,
}

impl SelectorHits {
    pub fn total(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.successful as f64 / self.total() as f64 * 100.0
        }
    }
}

/// Per-platform selector effectiveness counters. Logs a report every ten
/// attempts of a selector.
#[derive(Debug, Default)]
pub struct SelectorStats {
    platform: String,
    hits: Mutex<HashMap<String, SelectorHits>>,
}

impl SelectorStats {
    pub fn new(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, selector: &str, successful: bool) {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = hits.entry(selector.to_string()).or_default();
        if successful {
            entry.successful += 1;
        } else {
            entry.failed += 1;
        }

        if entry.total() % 10 == 0 {
            info!(
                platform = %self.platform,
                selector,
                success_rate = %format!("{:.2}", entry.success_rate()),
                total_attempts = entry.total(),
                successful = entry.successful,
                failed = entry.failed,
                "Selector effectiveness report"
            );
        }
    }

    pub fn get(&self, selector: &str) -> SelectorHits {
        self.hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(selector)
            .copied()
            .unwrap_or_default()
    }

    /// `try_selectors` that records which candidate matched, or a miss
    /// against the first candidate.
    pub fn try_selectors(
        &self,
        root: ElementRef,
        selectors: &[&str],
        attribute: Option<&str>,
    ) -> String {
        match try_selectors_with_match(root, selectors, attribute) {
            Some((index, value)) => {
                self.record(selectors[index], !value.is_empty());
                value
            }
            None => {
                if let Some(first) = selectors.first() {
                    self.record(first, false);
                }
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_selectors_first_match_wins() {
        let doc = Html::parse_document(
            r#"<div><h2 class="title">  Lakers   vs Celtics </h2><p class="sub">x</p></div>"#,
        );
        let value = try_selectors(doc.root_element(), &[".nonexistent", ".title"], None);
        assert_eq!(value, "Lakers vs Celtics");

        let value = try_selectors(doc.root_element(), &[".sub", ".title"], None);
        assert_eq!(value, "x");
    }

    #[test]
    fn test_try_selectors_no_match_is_empty() {
        let doc = Html::parse_document("<p>hello</p>");
        assert_eq!(try_selectors(doc.root_element(), &[".a", "#b"], None), "");
        assert_eq!(try_selectors(doc.root_element(), &[], None), "");
    }

    #[test]
    fn test_try_selectors_attribute_and_invalid() {
        let doc = Html::parse_document(r#"<a class="link" href="/event/42">Go</a>"#);
        let href = try_selectors(doc.root_element(), &["[[bad", "a.link"], Some("href"));
        assert_eq!(href, "/event/42");

        let (index, value) =
            try_selectors_with_match(doc.root_element(), &["a.link"], Some("data-id")).unwrap();
        assert_eq!(index, 0);
        assert_eq!(value, "");
    }

    #[test]
    fn test_try_selectors_scoped_to_node() {
        let doc = Html::parse_document(
            r#"<div class="card"><span class="n">A</span></div><div class="card"><span class="n">B</span></div>"#,
        );
        let selector = Selector::parse(".card").unwrap();
        let names: Vec<String> = doc
            .select(&selector)
            .map(|card| try_selectors(card, &[".n"], None))
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    const JSON_LD_PAGE: &str = r#"
        <html><head>
        <script type="application/ld+json">{"@type": "Event", "name": "First"}</script>
        <script type="application/ld+json">{"@type": "Organization", "name": "Org"}</script>
        <script type="application/ld+json">{ not json </script>
        <script type="application/ld+json">[{"@type": "Event", "name": "Second"}, {"name": "untyped"}]</script>
        <script type="application/ld+json">{"@graph": [{"@type": ["Event", "MusicEvent"], "name": "Third"}]}</script>
        <script type="application/ld+json">{"@type": "event", "name": "Lowercase"}</script>
        </head><body></body></html>
    "#;

    #[test]
    fn test_extract_json_ld_filters_by_type() {
        let doc = Html::parse_document(JSON_LD_PAGE);
        let events = extract_json_ld(&doc, Some("Event"));
        let names: Vec<&str> = events.iter().filter_map(|e| e["name"].as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_extract_json_ld_without_filter() {
        let doc = Html::parse_document(JSON_LD_PAGE);
        assert_eq!(extract_json_ld(&doc, None).len(), 5);
    }

    #[test]
    fn test_prices_from_json_ld_offers() {
        let doc = Html::parse_document(
            r#"<script type="application/ld+json">
            {"@type": "Event", "name": "Show", "offers": [
                {"price": "89.50", "priceCurrency": "EUR", "name": "VIP Box"},
                {"price": 40, "priceCurrency": "EUR"}
            ]}</script>"#,
        );
        let prices =
            extract_price_with_fallbacks(&doc, &DetectionRules::default(), |_| Vec::new());
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].price, 89.5);
        assert_eq!(prices[0].section, "VIP Box");
        assert_eq!(prices[1].section, "General");
        assert_eq!(prices[1].currency, "EUR");
    }

    #[test]
    fn test_prices_from_aggregate_offer() {
        let doc = Html::parse_document(
            r#"<script type="application/ld+json">
            {"@type": "Event", "offers": {"@type": "AggregateOffer", "lowPrice": 25, "highPrice": 140, "priceCurrency": "USD"}}
            </script>"#,
        );
        let prices = json_ld_offer_prices(&extract_json_ld(&doc, Some("Event")));
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        assert_eq!(values, vec![25.0, 140.0]);
    }

    #[test]
    fn test_prices_from_detected_selectors() {
        let doc = Html::parse_document(
            r#"<div><span class="amount">£1,200.00</span><span class="amount">£75</span></div>"#,
        );
        let prices =
            extract_price_with_fallbacks(&doc, &DetectionRules::default(), |_| Vec::new());
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        assert_eq!(values, vec![1200.0, 75.0]);
        assert!(prices.iter().all(|p| p.currency == "GBP"));
    }

    #[test]
    fn test_detected_euro_prices_use_european_grouping() {
        let doc = Html::parse_document(
            r#"<div><span class="amount">€1.250</span><span class="amount">€12,50</span></div>"#,
        );
        let prices = detected_prices(&doc, &DetectionRules::default());
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        assert_eq!(values, vec![1250.0, 12.5]);
    }

    #[test]
    fn test_prices_fall_back_to_platform() {
        let doc = Html::parse_document("<p>Tickets on sale soon</p>");
        let prices = extract_price_with_fallbacks(&doc, &DetectionRules::default(), |_| {
            vec![PriceEntry::new(10.0, "USD", "General")]
        });
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn test_selector_stats_tracking() {
        let stats = SelectorStats::new("stubhub");
        let doc = Html::parse_document(r#"<h1 class="title">Show</h1>"#);

        assert_eq!(stats.try_selectors(doc.root_element(), &[".missing", ".title"], None), "Show");
        assert_eq!(stats.try_selectors(doc.root_element(), &[".missing"], None), "");

        assert_eq!(stats.get(".title"), SelectorHits { successful: 1, failed: 0 });
        assert_eq!(stats.get(".missing").failed, 1);
    }

    #[test]
    fn test_success_rate() {
        let hits = SelectorHits {
            successful: 3,
            failed: 1,
        };
        assert_eq!(hits.success_rate(), 75.0);
        assert_eq!(SelectorHits::default().success_rate(), 0.0);
    }
}
