use std::num::ParseIntError;

use fastnum::UD64;

use super::{Listing, RemoteId, Timestamp};

/// Trade record as reported by the venue, not yet attributed to a listing.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct RemoteTrade {
    /// Venue-assigned identifier, verbatim.
    pub remote_id: String,

    /// Execution time.
    pub timestamp: Timestamp,

    /// Execution price.
    #[debug("{price}")]
    pub price: UD64,

    /// Executed amount of the base currency.
    #[debug("{quantity}")]
    pub quantity: UD64,
}

impl RemoteTrade {
    /// Ordering form of the venue identifier.
    pub fn parse_remote_id(&self) -> Result<RemoteId, ParseIntError> {
        self.remote_id.trim().parse()
    }
}

/// Executed trade of a listing.
///
/// Created by the ingestion loop only, never mutated afterwards.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct Trade {
    listing: Listing,
    timestamp: Timestamp,
    remote_key: String,
    #[debug("{price}")]
    price: UD64,
    #[debug("{quantity}")]
    quantity: UD64,
}

impl Trade {
    pub fn new(
        listing: Listing,
        timestamp: Timestamp,
        remote_key: impl Into<String>,
        price: UD64,
        quantity: UD64,
    ) -> Self {
        Self {
            listing,
            timestamp,
            remote_key: remote_key.into(),
            price,
            quantity,
        }
    }

    pub(crate) fn from_remote(listing: Listing, remote: RemoteTrade) -> Self {
        Self::new(
            listing,
            remote.timestamp,
            remote.remote_id,
            remote.price,
            remote.quantity,
        )
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Venue-assigned identifier, verbatim.
    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    /// Ordering form of [`Self::remote_key`].
    pub fn remote_id(&self) -> Result<RemoteId, ParseIntError> {
        self.remote_key.trim().parse()
    }

    pub fn price(&self) -> UD64 {
        self.price
    }

    pub fn quantity(&self) -> UD64 {
        self.quantity
    }
}
