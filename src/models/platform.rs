//! Marketplace identifiers and listing status enums.

use serde::{Deserialize, Serialize};

/// Ticket marketplace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    StubHub,
    FunZone,
    TickPick,
    Viagogo,
}

impl Platform {
    /// Every platform with a client implementation.
    pub const ALL: [Platform; 4] = [
        Platform::StubHub,
        Platform::FunZone,
        Platform::TickPick,
        Platform::Viagogo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StubHub => "stubhub",
            Self::FunZone => "funzone",
            Self::TickPick => "tickpick",
            Self::Viagogo => "viagogo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stubhub" => Some(Self::StubHub),
            "funzone" => Some(Self::FunZone),
            "tickpick" => Some(Self::TickPick),
            "viagogo" => Some(Self::Viagogo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized availability of an event's tickets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    SoldOut,
    Presale,
    NotAvailable,
    Cancelled,
    Postponed,
    #[default]
    Unknown,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::SoldOut => "sold_out",
            Self::Presale => "presale",
            Self::NotAvailable => "not_available",
            Self::Cancelled => "cancelled",
            Self::Postponed => "postponed",
            Self::Unknown => "unknown",
        }
    }

    /// Map a marketplace's internal status word onto the standard set.
    pub fn from_internal(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "onsale" | "on_sale" | "available" | "dostupné" => Self::Available,
            "soldout" | "sold_out" | "sold out" | "vypredané" => Self::SoldOut,
            "presale" | "predpredaj" => Self::Presale,
            "offsale" | "not_available" => Self::NotAvailable,
            "cancelled" | "canceled" | "zrušené" => Self::Cancelled,
            "postponed" | "odložené" => Self::Postponed,
            _ => Self::Unknown,
        }
    }

    /// Infer availability from what a listing page exposed.
    ///
    /// An explicit ticket count wins; otherwise listed prices mean tickets
    /// are on offer and no prices at all reads as sold out.
    pub fn infer(ticket_count: Option<u32>, has_prices: bool) -> Self {
        match ticket_count {
            Some(0) => Self::SoldOut,
            Some(_) => Self::Available,
            None if has_prices => Self::Available,
            None => Self::SoldOut,
        }
    }
}

/// Broad seating category derived from a section name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Premium,
    Floor,
    Upper,
    Lower,
    #[default]
    General,
}

impl SectionType {
    pub fn classify(section: &str) -> Self {
        let name = section.to_lowercase();
        if name.contains("vip") || name.contains("premium") {
            Self::Premium
        } else if name.contains("floor") || name.contains("pit") {
            Self::Floor
        } else if name.contains("upper") || name.contains("balcony") {
            Self::Upper
        } else if name.contains("lower") || name.contains("orchestra") {
            Self::Lower
        } else {
            Self::General
        }
    }
}
