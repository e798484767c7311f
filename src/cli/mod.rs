//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod events;
mod platforms;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::models::DEFAULT_PER_PAGE;
use crate::platforms::{build_rate_governor, PlatformRegistry};

#[derive(Parser)]
#[command(name = "ticketscout")]
#[command(about = "Search ticket marketplaces and normalize their listings")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./ticketscout.toml when present)
    #[arg(short, long, global = true, env = "TICKETSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Search a platform for events
    Search {
        /// Platform name (stubhub, funzone, tickpick, viagogo)
        platform: String,
        /// Search keyword
        keyword: String,
        /// City or region
        #[arg(short, long)]
        location: Option<String>,
        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = DEFAULT_PER_PAGE)]
        limit: usize,
        /// Earliest event date (YYYY-MM-DD)
        #[arg(long)]
        date_start: Option<NaiveDate>,
        /// Latest event date (YYYY-MM-DD)
        #[arg(long)]
        date_end: Option<NaiveDate>,
    },

    /// Fetch one event
    Event {
        platform: String,
        event_id: String,
    },

    /// Ticket listings summary for one event
    Tickets {
        platform: String,
        event_id: String,
    },

    /// Fetch venue details
    Venue {
        platform: String,
        venue_id: String,
    },

    /// List registered platforms
    Platforms,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;
    let rate = build_rate_governor(&config).await;
    let registry = PlatformRegistry::from_config(&config, rate);

    match cli.command {
        Commands::Search {
            platform,
            keyword,
            location,
            limit,
            date_start,
            date_end,
        } => {
            events::cmd_search(
                &registry,
                &platform,
                &keyword,
                location.as_deref(),
                limit,
                (date_start, date_end),
            )
            .await
        }
        Commands::Event { platform, event_id } => {
            events::cmd_event(&registry, &platform, &event_id).await
        }
        Commands::Tickets { platform, event_id } => {
            events::cmd_tickets(&registry, &platform, &event_id).await
        }
        Commands::Venue { platform, venue_id } => {
            events::cmd_venue(&registry, &platform, &venue_id).await
        }
        Commands::Platforms => platforms::cmd_platforms(&registry),
    }
}
