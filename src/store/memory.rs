use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Entity, TradeQuery, TradeStore};
use crate::{
    error::StoreError,
    types::{Currency, Listing, Trade, VenueId},
};

/// [`TradeStore`] keeping all data in process memory.
///
/// Inserts are validated in full before anything is applied, so a failed
/// insert leaves the store untouched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    venues: BTreeSet<VenueId>,
    currencies: BTreeSet<Currency>,
    listings: Vec<Listing>,
    trades: Vec<Trade>,
    trade_keys: HashSet<(Listing, String)>,
}

/// Entities of a single insert call which passed validation so far.
#[derive(Default)]
struct Staged<'a> {
    venues: HashSet<&'a VenueId>,
    currencies: HashSet<&'a Currency>,
    listings: HashSet<&'a Listing>,
    trade_keys: HashSet<(&'a Listing, &'a str)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored trades.
    pub fn trade_count(&self) -> usize {
        self.tables.read().trades.len()
    }
}

impl Tables {
    fn has_listing(&self, listing: &Listing) -> bool {
        self.listings.contains(listing)
    }

    fn validate<'a>(&self, entities: &'a [Entity]) -> Result<(), StoreError> {
        let mut staged = Staged::default();
        for entity in entities {
            match entity {
                Entity::Venue(venue) => {
                    if self.venues.contains(venue) || !staged.venues.insert(venue) {
                        return Err(StoreError::Duplicate(format!("venue {venue}")));
                    }
                }
                Entity::Currency(currency) => {
                    if self.currencies.contains(currency) || !staged.currencies.insert(currency) {
                        return Err(StoreError::Duplicate(format!("currency {currency}")));
                    }
                }
                Entity::Listing(listing) => {
                    let venue = listing.venue();
                    if !self.venues.contains(venue) && !staged.venues.contains(venue) {
                        return Err(StoreError::MissingReference(format!("venue {venue}")));
                    }
                    for currency in [listing.base(), listing.quote()] {
                        if !self.currencies.contains(currency)
                            && !staged.currencies.contains(currency)
                        {
                            return Err(StoreError::MissingReference(format!(
                                "currency {currency}"
                            )));
                        }
                    }
                    if self.has_listing(listing) || !staged.listings.insert(listing) {
                        return Err(StoreError::Duplicate(format!("listing {listing}")));
                    }
                }
                Entity::Trade(trade) => {
                    let listing = trade.listing();
                    if !self.has_listing(listing) && !staged.listings.contains(listing) {
                        return Err(StoreError::MissingReference(format!("listing {listing}")));
                    }
                    let key = (listing.clone(), trade.remote_key().to_string());
                    if self.trade_keys.contains(&key)
                        || !staged.trade_keys.insert((listing, trade.remote_key()))
                    {
                        return Err(StoreError::Duplicate(format!(
                            "trade {} of {listing}",
                            trade.remote_key()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, entities: Vec<Entity>) {
        for entity in entities {
            match entity {
                Entity::Venue(venue) => {
                    self.venues.insert(venue);
                }
                Entity::Currency(currency) => {
                    self.currencies.insert(currency);
                }
                Entity::Listing(listing) => self.listings.push(listing),
                Entity::Trade(trade) => {
                    self.trade_keys
                        .insert((trade.listing().clone(), trade.remote_key().to_string()));
                    self.trades.push(trade);
                }
            }
        }
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn insert(&self, entities: Vec<Entity>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.validate(&entities)?;
        tables.apply(entities);
        Ok(())
    }

    async fn has_venue(&self, venue: &VenueId) -> Result<bool, StoreError> {
        Ok(self.tables.read().venues.contains(venue))
    }

    async fn has_currency(&self, currency: &Currency) -> Result<bool, StoreError> {
        Ok(self.tables.read().currencies.contains(currency))
    }

    async fn find_listing(
        &self,
        venue: &VenueId,
        base: &Currency,
        quote: &Currency,
    ) -> Result<Option<Listing>, StoreError> {
        Ok(self
            .tables
            .read()
            .listings
            .iter()
            .find(|l| l.venue() == venue && l.base() == base && l.quote() == quote)
            .cloned())
    }

    async fn listings(&self, venue: &VenueId) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .tables
            .read()
            .listings
            .iter()
            .filter(|l| l.venue() == venue)
            .cloned()
            .collect())
    }

    async fn latest_trades(&self, listing: &Listing) -> Result<Vec<Trade>, StoreError> {
        let tables = self.tables.read();
        let of_listing: Vec<&Trade> = tables
            .trades
            .iter()
            .filter(|t| t.listing() == listing)
            .collect();
        let Some(latest) = of_listing.iter().map(|t| t.timestamp()).max() else {
            return Ok(vec![]);
        };
        Ok(of_listing
            .into_iter()
            .filter(|t| t.timestamp() == latest)
            .cloned()
            .collect())
    }

    async fn trades_page(
        &self,
        query: &TradeQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        Ok(self
            .tables
            .read()
            .trades
            .iter()
            .filter(|t| query.matches(t))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
