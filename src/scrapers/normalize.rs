//! Field normalizers for scraped marketplace data.
//!
//! Pure functions; none of them fail. Unparsable input yields `None` or a
//! documented default.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use url::Url;

use crate::models::PriceRange;

/// Currency used when a symbol is not recognised.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Date-time formats tried in order. Day-first layouts come before
/// month-first ones, so `01/02/2024` reads as 1 February.
const DATETIME_FORMATS: &[&str] = &[
    // English
    "%b %d, %Y at %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%d %b %Y %H:%M",
    // ISO
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    // European
    "%d.%m.%Y %H:%M",
    "%d. %m. %Y %H:%M",
    "%d/%m/%Y %H:%M",
    // American
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%d %b %Y",
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d. %m. %Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
];

static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(event\s+date:?|date:?|when:?|dátum:?|termín:?|on\s+)\s*").unwrap()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Numeric token: space-grouped thousands, or digits with `.`/`,` separators.
static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:[ \u{a0}]\d{3})+(?:[.,]\d+)?|\d[\d.,]*").unwrap()
});

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}\s*\d{2}\s*").unwrap());

const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("Kč", "CZK"),
    ("USD", "USD"),
    ("EUR", "EUR"),
    ("GBP", "GBP"),
    ("JPY", "JPY"),
    ("CZK", "CZK"),
];

const US_STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("USA", "United States"),
    ("CA", "Canada"),
    ("UK", "United Kingdom"),
    ("GB", "United Kingdom"),
    ("AU", "Australia"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("NL", "Netherlands"),
    ("BE", "Belgium"),
    ("SK", "Slovakia"),
    ("CZ", "Czech Republic"),
];

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Strip labels such as "Date:" or "Termín:" and collapse whitespace.
pub fn clean_date_string(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    DATE_PREFIX.replace(&collapsed, "").trim().to_string()
}

/// Parse a marketplace date string using the built-in format list.
pub fn parse_event_date(raw: &str) -> Option<NaiveDateTime> {
    parse_event_date_with(raw, &[])
}

/// Parse a date string, trying `extra_formats` (date-time layouts) before the
/// built-in list. Returns `None` when nothing matches.
pub fn parse_event_date_with(raw: &str, extra_formats: &[&str]) -> Option<NaiveDateTime> {
    let cleaned = clean_date_string(raw);
    if cleaned.is_empty() {
        return None;
    }

    for format in extra_formats.iter().chain(DATETIME_FORMATS) {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(parsed);
        }
    }

    for format in extra_formats.iter().chain(DATE_FORMATS) {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    DateTime::parse_from_rfc3339(&cleaned)
        .or_else(|_| DateTime::parse_from_rfc2822(&cleaned))
        .map(|dt| dt.naive_local())
        .ok()
}

/// Map a currency symbol or code to its ISO code, defaulting to USD.
pub fn map_currency_symbol(symbol: &str) -> &'static str {
    let symbol = symbol.trim();
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| marker.eq_ignore_ascii_case(symbol))
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_CURRENCY)
}

/// First currency marker found in `text`, if any.
pub fn detect_currency(text: &str) -> Option<&'static str> {
    CURRENCY_MARKERS
        .iter()
        .filter_map(|(marker, code)| text.find(marker).map(|pos| (pos, *code)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, code)| code)
}

fn touches_currency(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();
    CURRENCY_MARKERS
        .iter()
        .any(|(marker, _)| before.ends_with(marker) || after.starts_with(marker))
}

/// Digit grouping used in a marketplace's price text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceFormat {
    /// `1,250.50`: comma groups thousands, period marks decimals.
    #[default]
    Us,
    /// `1.250,50`: period groups thousands, comma marks decimals.
    European,
}

impl PriceFormat {
    /// Convention for an ISO currency code. Euro and koruna prices are
    /// written European style.
    pub fn for_currency(code: &str) -> Self {
        match code {
            "EUR" | "CZK" => Self::European,
            _ => Self::Us,
        }
    }

    /// Whether a lone `separator` followed by `trailing` digits groups
    /// thousands rather than marking decimals.
    fn groups_thousands(self, separator: char, trailing: usize) -> bool {
        match self {
            Self::Us => separator == ',' && trailing != 2,
            Self::European => trailing == 3,
        }
    }
}

fn parse_price_token(token: &str, format: PriceFormat) -> Option<f64> {
    let token: String = token
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    let normalized = match (token.rfind(','), token.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(at), None) => single_separator(&token, ',', at, format),
        (None, Some(at)) => single_separator(&token, '.', at, format),
        (None, None) => token,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn single_separator(token: &str, separator: char, at: usize, format: PriceFormat) -> String {
    let repeated = token.matches(separator).count() > 1;
    let trailing = token.len() - at - 1;
    if repeated || format.groups_thousands(separator, trailing) {
        token.replace(separator, "")
    } else {
        token.replace(separator, ".")
    }
}

/// Parse the numeric amount out of a price string.
///
/// Prefers a number adjacent to a currency marker. A currency found in the
/// text decides the separator convention; text without one is read per
/// `PriceFormat::default()`. Returns `None` when the string holds no number.
pub fn extract_numeric_price(raw: &str) -> Option<f64> {
    extract_numeric_price_in(raw, PriceFormat::default())
}

/// As [`extract_numeric_price`], reading currency-less text per `fallback`.
pub fn extract_numeric_price_in(raw: &str, fallback: PriceFormat) -> Option<f64> {
    let format = detect_currency(raw)
        .map(PriceFormat::for_currency)
        .unwrap_or(fallback);
    let tokens: Vec<_> = PRICE_TOKEN.find_iter(raw).collect();
    let token = tokens
        .iter()
        .find(|m| touches_currency(raw, m.start(), m.end()))
        .or_else(|| tokens.first())?;
    parse_price_token(token.as_str(), format)
}

/// Aggregate raw price strings into a range. Unparsable entries are ignored;
/// `None` when nothing parses. Strings without a currency marker are read
/// in `default_currency`'s convention.
pub fn extract_price_range<S: AsRef<str>>(prices: &[S], default_currency: &str) -> Option<PriceRange> {
    let format = PriceFormat::for_currency(default_currency);
    let values: Vec<f64> = prices
        .iter()
        .filter_map(|p| extract_numeric_price_in(p.as_ref(), format))
        .collect();
    let currency = prices
        .iter()
        .find_map(|p| detect_currency(p.as_ref()))
        .unwrap_or(default_currency);
    PriceRange::from_values(&values, currency)
}

/// Resolve `raw` against `base_url`.
///
/// Absolute URLs are returned unchanged, root-relative paths take the base
/// origin, and other relative paths resolve against the base path.
pub fn normalize_url(raw: &str, base_url: &str) -> String {
    let raw = raw.trim();
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }

    match Url::parse(base_url).and_then(|base| base.join(raw)) {
        Ok(joined) => joined.to_string(),
        Err(_) => {
            let base = base_url.trim_end_matches('/');
            if raw.starts_with('/') {
                format!("{}{}", base, raw)
            } else {
                format!("{}/{}", base, raw)
            }
        }
    }
}

/// City portion of a location string: postal code removed, text before the
/// first comma. "Unknown City" when nothing is left.
pub fn extract_city(location: &str) -> String {
    let location = POSTAL_CODE.replace(location.trim(), "");
    let city = location.split(',').next().unwrap_or("").trim();
    if city.is_empty() {
        "Unknown City".to_string()
    } else {
        city.to_string()
    }
}

/// Country for a "City, Region, Country" location string.
///
/// A two-part location ending in a US state code is in the United States.
/// Known country codes map to names; any other trailing part is returned
/// as-is. Single-part locations fall back to `default_country`.
pub fn determine_country(location: &str, default_country: &str) -> String {
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() < 2 {
        return default_country.to_string();
    }

    let last = parts[parts.len() - 1];
    if parts.len() == 2 && US_STATE_CODES.contains(&last) {
        return "United States".to_string();
    }

    COUNTRY_CODES
        .iter()
        .find(|(code, _)| *code == last)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| last.to_string())
}

/// Title-case a URL slug: `rock-night_2024` becomes `Rock Night 2024`.
pub fn name_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_european_date() {
        let date = parse_event_date("25.12.2024 20:00").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 12, 25));
        assert_eq!(date.hour(), 20);
    }

    #[test]
    fn test_parse_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 25)
            .unwrap()
            .and_hms_opt(19, 30, 0)
            .unwrap();
        for raw in [
            "2024-12-25 19:30:00",
            "2024-12-25 19:30",
            "2024-12-25T19:30:00",
            "Dec 25, 2024 7:30 PM",
            "December 25, 2024 at 7:30 PM",
            "25 Dec 2024 19:30",
            "25.12.2024 19:30",
            "25. 12. 2024 19:30",
            "25/12/2024 19:30",
            "12/25/2024 19:30",
            "2024-12-25T19:30:00-05:00",
        ] {
            assert_eq!(parse_event_date(raw), Some(expected), "{}", raw);
        }
    }

    #[test]
    fn test_parse_date_only() {
        let date = parse_event_date("Dec 25, 2024").unwrap();
        assert_eq!((date.month(), date.day(), date.hour()), (12, 25, 0));
        assert!(parse_event_date("1.3.2025").is_some());
    }

    #[test]
    fn test_parse_strips_prefixes() {
        assert!(parse_event_date("Date: 2024-12-25").is_some());
        assert!(parse_event_date("  Event Date:\n 25.12.2024  ").is_some());
        assert!(parse_event_date("Termín: 25.12.2024 20:00").is_some());
        assert!(parse_event_date("on Dec 25, 2024").is_some());
    }

    #[test]
    fn test_day_first_before_month_first() {
        let date = parse_event_date("01/02/2024").unwrap();
        assert_eq!((date.day(), date.month()), (1, 2));
    }

    #[test]
    fn test_unparsable_dates() {
        assert_eq!(parse_event_date(""), None);
        assert_eq!(parse_event_date("sometime soon"), None);
        assert_eq!(parse_event_date("32.13.2024"), None);
    }

    #[test]
    fn test_extra_formats_take_priority() {
        let date = parse_event_date_with("2024|12|25 20:00", &["%Y|%m|%d %H:%M"]).unwrap();
        assert_eq!(date.day(), 25);
    }

    #[test]
    fn test_extract_numeric_price() {
        assert_eq!(extract_numeric_price("€1,250.00"), Some(1250.0));
        assert_eq!(extract_numeric_price("No price available"), None);
        assert_eq!(extract_numeric_price("$45"), Some(45.0));
        assert_eq!(extract_numeric_price("1.250,50 €"), Some(1250.5));
        assert_eq!(extract_numeric_price("45,50 €"), Some(45.5));
        assert_eq!(extract_numeric_price("1 250,00 Kč"), Some(1250.0));
        assert_eq!(extract_numeric_price("$1,250,000"), Some(1_250_000.0));
        assert_eq!(extract_numeric_price("From $89.99"), Some(89.99));
    }

    #[test]
    fn test_european_grouping_for_euro_and_koruna() {
        assert_eq!(extract_numeric_price("1.250 €"), Some(1250.0));
        assert_eq!(extract_numeric_price("od 1.500 Kč"), Some(1500.0));
        assert_eq!(extract_numeric_price("12,5 €"), Some(12.5));
        assert_eq!(extract_numeric_price("€1,250"), Some(1250.0));
        assert_eq!(extract_numeric_price("12.50 €"), Some(12.5));
        assert_eq!(extract_numeric_price("2.500.000 Kč"), Some(2_500_000.0));
    }

    #[test]
    fn test_dollar_grouping_unchanged() {
        assert_eq!(extract_numeric_price("$1.250"), Some(1.25));
        assert_eq!(extract_numeric_price("$1,250"), Some(1250.0));
        assert_eq!(extract_numeric_price("$12,5"), Some(125.0));
    }

    #[test]
    fn test_fallback_format_for_bare_numbers() {
        assert_eq!(extract_numeric_price_in("1.250", PriceFormat::European), Some(1250.0));
        assert_eq!(extract_numeric_price_in("49,9", PriceFormat::European), Some(49.9));
        assert_eq!(extract_numeric_price_in("1.250", PriceFormat::Us), Some(1.25));
        // A marker in the text wins over the fallback.
        assert_eq!(extract_numeric_price_in("$1.250", PriceFormat::European), Some(1.25));
        assert_eq!(PriceFormat::for_currency("CZK"), PriceFormat::European);
        assert_eq!(PriceFormat::for_currency("GBP"), PriceFormat::Us);
    }

    #[test]
    fn test_price_prefers_currency_adjacent_number() {
        assert_eq!(extract_numeric_price("2 tickets from $120"), Some(120.0));
        assert_eq!(extract_numeric_price("Section 101 - 75 €"), Some(75.0));
    }

    #[test]
    fn test_map_currency_symbol() {
        assert_eq!(map_currency_symbol("$"), "USD");
        assert_eq!(map_currency_symbol("€"), "EUR");
        assert_eq!(map_currency_symbol("£"), "GBP");
        assert_eq!(map_currency_symbol("¥"), "JPY");
        assert_eq!(map_currency_symbol("₿"), "USD");
    }

    #[test]
    fn test_detect_currency() {
        assert_eq!(detect_currency("od 25 €"), Some("EUR"));
        assert_eq!(detect_currency("USD 40"), Some("USD"));
        assert_eq!(detect_currency("40"), None);
    }

    #[test]
    fn test_price_range() {
        let prices = ["$120.00", "Sold out", "$45", "$1,250.00"];
        let range = extract_price_range(&prices, "USD").unwrap();
        assert_eq!(range.min, 45.0);
        assert_eq!(range.max, 1250.0);
        assert_eq!(range.currency, "USD");

        let range = extract_price_range(&["25 €"], "USD").unwrap();
        assert_eq!((range.min, range.max), (25.0, 25.0));
        assert_eq!(range.currency, "EUR");

        let range = extract_price_range(&["35 €", "1.250 €"], "EUR").unwrap();
        assert_eq!((range.min, range.max), (35.0, 1250.0));

        let range = extract_price_range(&["od 1.500", "990"], "CZK").unwrap();
        assert_eq!((range.min, range.max), (990.0, 1500.0));

        assert!(extract_price_range(&["call for pricing"], "USD").is_none());
        assert!(extract_price_range::<&str>(&[], "USD").is_none());
    }

    #[test]
    fn test_normalize_url() {
        let base = "https://www.stubhub.com/secure/search";
        assert_eq!(
            normalize_url("https://www.stubhub.com/event/1", base),
            "https://www.stubhub.com/event/1"
        );
        assert_eq!(
            normalize_url("/event/123", base),
            "https://www.stubhub.com/event/123"
        );
        assert_eq!(
            normalize_url("event/123", "https://www.funzone.sk/events/"),
            "https://www.funzone.sk/events/event/123"
        );
    }

    #[test]
    fn test_normalize_url_idempotent() {
        let base = "https://www.tickpick.com";
        let once = normalize_url("/buy-tickets/42", base);
        assert_eq!(normalize_url(&once, base), once);
    }

    #[test]
    fn test_extract_city() {
        assert_eq!(extract_city("New York, NY"), "New York");
        assert_eq!(extract_city("811 01 Bratislava, Slovensko"), "Bratislava");
        assert_eq!(extract_city("04001 Košice"), "Košice");
        assert_eq!(extract_city(""), "Unknown City");
    }

    #[test]
    fn test_determine_country() {
        assert_eq!(determine_country("Los Angeles, CA", "United States"), "United States");
        assert_eq!(determine_country("Toronto, ON, CA", "United States"), "Canada");
        assert_eq!(determine_country("London, UK", "United States"), "United Kingdom");
        assert_eq!(determine_country("Vienna, Austria", "United States"), "Austria");
        assert_eq!(determine_country("Bratislava", "Slovakia"), "Slovakia");
    }

    #[test]
    fn test_name_from_slug() {
        assert_eq!(name_from_slug("rock-night_2024"), "Rock Night 2024");
        assert_eq!(name_from_slug(""), "");
    }
}
