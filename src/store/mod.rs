//! Persistence of reference data and trade history.
//!
//! [`TradeStore`] is a typed repository: every query the ingestion loop needs
//! is a named method returning typed results. [`query_each`] builds batched
//! full scans on top of [`TradeStore::trades_page`].
//!
//! [`MemoryStore`] is the bundled implementation keeping everything in
//! process memory.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::{
    error::StoreError,
    types::{Currency, Listing, Timestamp, Trade, VenueId},
};

/// Default number of rows fetched per page by [`query_each`].
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Unit of data accepted by [`TradeStore::insert`].
#[derive(Clone, Debug)]
pub enum Entity {
    Venue(VenueId),
    Currency(Currency),
    Listing(Listing),
    Trade(Trade),
}

/// Selection of trades for paginated queries.
///
/// Matching trades are always returned in insertion order.
#[derive(Clone, Debug, Default)]
pub struct TradeQuery {
    listing: Option<Listing>,
    since: Option<Timestamp>,
}

impl TradeQuery {
    /// Selects all trades.
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects trades of the given listing.
    pub fn for_listing(listing: Listing) -> Self {
        Self {
            listing: Some(listing),
            since: None,
        }
    }

    /// Narrows the selection to trades executed at or after `since`.
    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, trade: &Trade) -> bool {
        self.listing.as_ref().is_none_or(|l| l == trade.listing())
            && self.since.is_none_or(|s| trade.timestamp() >= s)
    }
}

/// Transactional store of venues, currencies, listings and trades.
///
/// Every call acquires and releases its own resources; nothing is shared
/// between calls.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Persists all entities or none of them.
    ///
    /// Fails with [`StoreError::Duplicate`] if an entity already exists and
    /// with [`StoreError::MissingReference`] if a listing or trade refers to
    /// data which is neither stored nor part of the same call.
    async fn insert(&self, entities: Vec<Entity>) -> Result<(), StoreError>;

    async fn has_venue(&self, venue: &VenueId) -> Result<bool, StoreError>;

    async fn has_currency(&self, currency: &Currency) -> Result<bool, StoreError>;

    /// Looks up a listing, `None` if it is not stored.
    async fn find_listing(
        &self,
        venue: &VenueId,
        base: &Currency,
        quote: &Currency,
    ) -> Result<Option<Listing>, StoreError>;

    /// Looks up a listing which is expected to exist.
    async fn listing(
        &self,
        venue: &VenueId,
        base: &Currency,
        quote: &Currency,
    ) -> Result<Listing, StoreError> {
        self.find_listing(venue, base, quote)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("listing {base}.{quote}@{venue}")))
    }

    /// All listings of the venue, in insertion order.
    async fn listings(&self, venue: &VenueId) -> Result<Vec<Listing>, StoreError>;

    /// Trades of the listing sharing its most recent timestamp.
    async fn latest_trades(&self, listing: &Listing) -> Result<Vec<Trade>, StoreError>;

    /// Up to `limit` trades matching the query, skipping the first `offset`.
    async fn trades_page(
        &self,
        query: &TradeQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError>;
}

/// Visits trades matching the query page by page, `batch_size` rows at a time.
///
/// Stops as soon as `handler` returns `false` or a page comes back empty.
/// Returns the number of rows passed to the handler.
pub async fn query_each<S, F>(
    store: &S,
    query: &TradeQuery,
    batch_size: usize,
    mut handler: F,
) -> Result<usize, StoreError>
where
    S: TradeStore + ?Sized,
    F: FnMut(&Trade) -> bool,
{
    if batch_size == 0 {
        return Err(StoreError::InvalidArgument("batch size must be positive".into()));
    }
    let mut visited = 0;
    let mut offset = 0;
    loop {
        let page = store.trades_page(query, offset, batch_size).await?;
        if page.is_empty() {
            return Ok(visited);
        }
        for trade in &page {
            visited += 1;
            if !handler(trade) {
                return Ok(visited);
            }
        }
        offset += batch_size;
    }
}
