//! Venue records.

use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Venue details. Always carries id, name, city and country; platforms
/// without a venue page fill placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
}

impl Venue {
    /// Best-effort record when nothing beyond the id is known.
    pub fn placeholder(platform: Platform, id: &str, country: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Unknown Venue".to_string(),
            city: "Unknown City".to_string(),
            country: country.to_string(),
            platform,
            address: None,
            capacity: None,
            description: None,
            amenities: Vec::new(),
        }
    }
}
