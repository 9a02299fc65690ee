//! Configuration for the trade ingester.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): venue connection
//! - CLI arguments: listings, request budget and seeding mode

use std::time::Duration;

use clap::Parser;
use trade_ingest::{
    Venue,
    error::SchedulerError,
    scheduler::Rate,
    seed::InitMode,
    types::{Currency, VenueId},
    venue::bitfinex,
};
use url::Url;

/// Environment configuration (connection details).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// REST base URL of the venue (default: public Bitfinex API)
    pub venue_url: Option<String>,

    /// Optional timeout of a single venue request (default: 30s)
    pub request_timeout_seconds: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Parse the venue URL.
    pub fn venue_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.venue_url.as_deref().unwrap_or(bitfinex::DEFAULT_BASE_URL))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(bitfinex::DEFAULT_TIMEOUT)
    }
}

/// CLI arguments of the ingester.
#[derive(Debug, Parser)]
#[command(name = "trade-ingest")]
#[command(about = "Polls venue trades of all listings under a shared request budget")]
pub struct CliConfig {
    /// Venue to poll
    #[arg(long, default_value = "bitfinex")]
    pub venue: String,

    /// Listings to poll as BASE/QUOTE (comma-separated, e.g. "BTC/USD,LTC/BTC")
    /// If not specified, polls the default listings of the venue
    #[arg(long, value_delimiter = ',')]
    pub listings: Vec<String>,

    /// Venue requests allowed per window
    #[arg(long, default_value_t = 1)]
    pub queries: usize,

    /// Length of the request window in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub per_ms: u64,

    /// Seed the store in one transaction instead of adding missing entries.
    /// The store is in memory and starts empty on every run, so both modes
    /// end up with the same data
    #[arg(long)]
    pub reset: bool,
}

/// Validated ingester configuration.
#[derive(Debug)]
pub struct IngestConfig {
    pub venue: Venue,
    pub rate: Rate,
    pub mode: InitMode,
}

impl CliConfig {
    pub fn to_ingest_config(&self) -> Result<IngestConfig, ConfigError> {
        let venue = VenueId::new(&self.venue);
        let default_venue = Venue::bitfinex();
        if &venue != default_venue.id() {
            return Err(ConfigError::UnsupportedVenue(self.venue.clone()));
        }

        let venue = if self.listings.is_empty() {
            default_venue
        } else {
            let pairs = self
                .listings
                .iter()
                .map(|listing| parse_pair(listing))
                .collect::<Result<Vec<_>, _>>()?;
            Venue::custom(venue, pairs)
        };

        if self.per_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        let rate = Rate::new(self.queries, Duration::from_millis(self.per_ms))?;

        let mode = if self.reset {
            InitMode::Reset
        } else {
            InitMode::Update
        };

        Ok(IngestConfig { venue, rate, mode })
    }
}

fn parse_pair(listing: &str) -> Result<(Currency, Currency), ConfigError> {
    match listing.split_once('/') {
        Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
            Ok((Currency::new(base), Currency::new(quote)))
        }
        _ => Err(ConfigError::InvalidListing(listing.to_string())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported venue {0}")]
    UnsupportedVenue(String),

    #[error("Invalid listing {0}, expected BASE/QUOTE")]
    InvalidListing(String),

    #[error("per_ms cannot be zero")]
    ZeroWindow,

    #[error("Invalid rate: {0}")]
    InvalidRate(#[from] SchedulerError),
}
