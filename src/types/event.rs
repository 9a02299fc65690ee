use super::{Listing, Trade};

/// Events the ingestion loop hands over to the downstream consumer.
#[derive(Clone, Debug)]
pub enum MarketEvent {
    /// Trade not seen before for its listing.
    Trade(Trade),

    /// Polling cycle of a listing failed.
    Error(MarketDataError),
}

/// Failure to obtain market data for a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketDataError {
    /// Listing the failed cycle polled for.
    pub listing: Listing,

    /// Human-readable failure cause.
    pub cause: String,
}

impl MarketDataError {
    pub fn new(listing: Listing, cause: impl ToString) -> Self {
        Self {
            listing,
            cause: cause.to_string(),
        }
    }
}

impl MarketEvent {
    pub fn listing(&self) -> &Listing {
        match self {
            MarketEvent::Trade(trade) => trade.listing(),
            MarketEvent::Error(error) => &error.listing,
        }
    }

    pub fn as_trade(&self) -> Option<&Trade> {
        match self {
            MarketEvent::Trade(trade) => Some(trade),
            MarketEvent::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&MarketDataError> {
        match self {
            MarketEvent::Trade(_) => None,
            MarketEvent::Error(error) => Some(error),
        }
    }
}
