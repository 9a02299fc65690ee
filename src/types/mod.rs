mod event;
mod trade;

pub use event::*;
pub use trade::*;

use chrono::{DateTime, Utc};

/// Venue-assigned trade identifier in its ordering form.
///
/// Venues hand identifiers over as opaque strings, the ingestion loop
/// parses them into this type to compare positions.
pub type RemoteId = u64;

/// Instant a trade was executed at.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a market venue, always upper-case.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct VenueId(String);

impl VenueId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fungible unit a listing trades, identified by its symbol.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct Currency(String);

impl Currency {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_ascii_uppercase())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }
}

/// Possibility to trade one currency for another on a specific venue.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{base}.{quote}@{venue}")]
pub struct Listing {
    venue: VenueId,
    base: Currency,
    quote: Currency,
}

impl Listing {
    pub fn new(venue: VenueId, base: Currency, quote: Currency) -> Self {
        Self { venue, base, quote }
    }

    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn quote(&self) -> &Currency {
        &self.quote
    }
}
