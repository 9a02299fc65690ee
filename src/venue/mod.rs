//! Market venue adapters.
//!
//! [`TradeSource`] is the only thing the ingestion loop knows about a venue.
//! [`bitfinex::BitfinexSource`] implements it over the Bitfinex REST API.

pub mod bitfinex;

use async_trait::async_trait;

use crate::{
    error::VenueError,
    types::{Listing, RemoteTrade, Timestamp},
};

/// Source of executed trades of a venue.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Returns trades of the listing executed at or after `since`,
    /// ordered by remote identifier, oldest first.
    ///
    /// Records which can not be converted are logged and left out, the
    /// rest of the batch is still returned.
    async fn fetch_trades(
        &self,
        listing: &Listing,
        since: Timestamp,
    ) -> Result<Vec<RemoteTrade>, VenueError>;
}
