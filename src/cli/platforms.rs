//! Registered platform listing.

use serde::Serialize;

use crate::platforms::PlatformRegistry;

#[derive(Serialize)]
struct PlatformSummary<'a> {
    name: &'a str,
    api: bool,
    scraping: bool,
    base_url: &'a str,
}

/// Print each registered platform with its API and scraping state.
pub fn cmd_platforms(registry: &PlatformRegistry) -> anyhow::Result<()> {
    let summaries: Vec<PlatformSummary> = registry
        .clients()
        .map(|client| {
            let core = client.core();
            PlatformSummary {
                name: client.platform_name(),
                api: client.has_api() && core.api_available(),
                scraping: core.scraping_enabled(),
                base_url: core.base_url(),
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
