//! Data models for ticketscout.

mod event;
mod platform;
mod search;
mod venue;

pub use event::{EventTickets, Guarantee, GuaranteeKind, NormalizedEvent, PriceEntry, PriceRange};
pub use platform::{AvailabilityStatus, Platform, SectionType};
pub use search::{RequestMethod, ScrapeRequest, SearchCriteria, DEFAULT_PER_PAGE};
pub use venue::Venue;
