//! ticketscout - ticket marketplace search and scraping clients.
//!
//! Each marketplace is a [`platforms::PlatformClient`]. Clients prefer the
//! platform's API when credentials are configured and otherwise scrape its
//! public pages, pacing requests through a shared rate-limit store and
//! normalizing everything into [`models::NormalizedEvent`].

#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod platforms;
pub mod rate_limit;
pub mod scrapers;
