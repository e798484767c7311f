//! Event, ticket and venue lookups. All output is JSON on stdout.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::SearchCriteria;
use crate::platforms::{PlatformClient, PlatformRegistry};

fn client_for(registry: &PlatformRegistry, name: &str) -> anyhow::Result<Arc<dyn PlatformClient>> {
    registry.get(name).ok_or_else(|| {
        anyhow!(
            "Unknown or disabled platform '{}' (available: {})",
            name,
            registry.names().join(", ")
        )
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Search one platform.
pub async fn cmd_search(
    registry: &PlatformRegistry,
    platform: &str,
    keyword: &str,
    location: Option<&str>,
    limit: usize,
    (date_start, date_end): (Option<NaiveDate>, Option<NaiveDate>),
) -> anyhow::Result<()> {
    let client = client_for(registry, platform)?;
    let mut criteria = SearchCriteria::new(keyword)
        .with_per_page(limit)
        .with_dates(date_start, date_end);
    if let Some(location) = location {
        criteria = criteria.with_location(location);
    }

    let events = client.search_events(&criteria).await;
    tracing::info!(platform, count = events.len(), "Search finished");
    print_json(&events)
}

/// Fetch one event; prints `null` when it cannot be found.
pub async fn cmd_event(
    registry: &PlatformRegistry,
    platform: &str,
    event_id: &str,
) -> anyhow::Result<()> {
    let client = client_for(registry, platform)?;
    print_json(&client.get_event(event_id).await)
}

pub async fn cmd_tickets(
    registry: &PlatformRegistry,
    platform: &str,
    event_id: &str,
) -> anyhow::Result<()> {
    let client = client_for(registry, platform)?;
    print_json(&client.get_event_tickets(event_id).await)
}

pub async fn cmd_venue(
    registry: &PlatformRegistry,
    platform: &str,
    venue_id: &str,
) -> anyhow::Result<()> {
    let client = client_for(registry, platform)?;
    print_json(&client.get_venue(venue_id).await)
}
