//! Rate-limited trade ingestion.
//!
//! # Overview
//!
//! Polls a market venue for recent trades of every configured listing,
//! forwards trades not seen before to a downstream consumer and keeps
//! polling forever under a shared request budget.
//!
//! Use [`seed::SeedData`] to register the venue listings with a
//! [`store::TradeStore`], then [`ingest::start`] to create one polling
//! job per listing and hand them over to a [`scheduler::RateLimiter`].
//! New trades and failed polling cycles arrive as [`types::MarketEvent`]s
//! at the [`publish::Publisher`]; [`recorder::run`] persists them so that
//! polling resumes where it stopped.
//!
//! See `./tests` and the `trade_ingest` binary for examples.
//!
//! # Limitations/follow-ups
//!
//! * Only an in-memory store is provided.
//!
//! * Delivery to the consumer is at-most-once per process, a trade
//!   published but not yet persisted is fetched again after a restart.
//!
//! # Testing
//!
//! [`testing`] module provides a scripted venue, a recording publisher
//! and fixtures.

pub mod error;
pub mod ingest;
pub mod num;
pub mod publish;
pub mod recorder;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod testing;
pub mod types;
pub mod venue;

use types::{Currency, Listing, VenueId};

#[derive(Clone, Debug)]
/// Venue trades are ingested from, with the pairs it lists.
pub struct Venue {
    id: VenueId,
    pairs: Vec<(Currency, Currency)>,
}

impl Venue {
    pub fn bitfinex() -> Self {
        Self {
            id: VenueId::new("BITFINEX"),
            pairs: vec![
                (Currency::new("BTC"), Currency::new("USD")),
                (Currency::new("LTC"), Currency::new("USD")),
                (Currency::new("LTC"), Currency::new("BTC")),
            ],
        }
    }

    pub fn custom(id: VenueId, pairs: Vec<(Currency, Currency)>) -> Self {
        Self { id, pairs }
    }

    pub fn id(&self) -> &VenueId {
        &self.id
    }

    /// Base/quote pairs, in configuration order.
    pub fn pairs(&self) -> &[(Currency, Currency)] {
        &self.pairs
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.pairs
            .iter()
            .map(|(base, quote)| Listing::new(self.id.clone(), base.clone(), quote.clone()))
            .collect()
    }
}
