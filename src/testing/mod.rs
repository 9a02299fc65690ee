//! Test doubles and fixtures.
//!
//! [`ScriptedSource`] replays queued venue responses per listing and records
//! the query windows it was asked for. [`RecordingPublisher`] keeps every
//! published event for inspection. [`FailingStore`] injects store errors.
//!
//! Fixture helpers build listings, trades and venue records with integer
//! seconds and identifiers, prices are fixed.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::DateTime;
use dashmap::{DashMap, DashSet};
use fastnum::udec64;
use parking_lot::Mutex;

use crate::{
    error::{StoreError, VenueError},
    publish::Publisher,
    seed::{InitMode, SeedData},
    store::{Entity, MemoryStore, TradeQuery, TradeStore},
    types::{
        Currency, Listing, MarketDataError, MarketEvent, RemoteId, RemoteTrade, Timestamp, Trade,
        VenueId,
    },
    venue::TradeSource,
};

type Response = Result<Vec<RemoteTrade>, VenueError>;

/// [`TradeSource`] replaying queued responses, an empty batch once the
/// queue of a listing is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: DashMap<Listing, VecDeque<Response>>,
    calls: DashMap<Listing, Vec<Timestamp>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, listing: &Listing, trades: Vec<RemoteTrade>) {
        self.push(listing, Ok(trades));
    }

    pub fn push_err(&self, listing: &Listing, error: VenueError) {
        self.push(listing, Err(error));
    }

    fn push(&self, listing: &Listing, response: Response) {
        self.responses
            .entry(listing.clone())
            .or_default()
            .push_back(response);
    }

    /// `since` arguments of all fetches of the listing so far.
    pub fn calls(&self, listing: &Listing) -> Vec<Timestamp> {
        self.calls
            .get(listing)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TradeSource for ScriptedSource {
    async fn fetch_trades(
        &self,
        listing: &Listing,
        since: Timestamp,
    ) -> Result<Vec<RemoteTrade>, VenueError> {
        self.calls.entry(listing.clone()).or_default().push(since);
        self.responses
            .get_mut(listing)
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(vec![]))
    }
}

/// [`Publisher`] keeping all events in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.events
            .lock()
            .iter()
            .filter_map(MarketEvent::as_trade)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<MarketDataError> {
        self.events
            .lock()
            .iter()
            .filter_map(MarketEvent::as_error)
            .cloned()
            .collect()
    }

    /// Remote identifiers of published trades, in publishing order.
    pub fn forwarded_ids(&self) -> Vec<RemoteId> {
        self.trades()
            .iter()
            .map(|t| t.remote_id().unwrap())
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, event: MarketEvent) {
        self.events.lock().push(event);
    }
}

/// [`MemoryStore`] failing selected queries with [`StoreError::Backend`].
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    listings_unavailable: AtomicBool,
    broken_history: DashSet<Listing>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Makes [`TradeStore::listings`] fail.
    pub fn fail_listings(&self) {
        self.listings_unavailable.store(true, Ordering::SeqCst);
    }

    /// Makes [`TradeStore::latest_trades`] fail for the listing.
    pub fn break_history(&self, listing: &Listing) {
        self.broken_history.insert(listing.clone());
    }
}

#[async_trait]
impl TradeStore for FailingStore {
    async fn insert(&self, entities: Vec<Entity>) -> Result<(), StoreError> {
        self.inner.insert(entities).await
    }

    async fn has_venue(&self, venue: &VenueId) -> Result<bool, StoreError> {
        self.inner.has_venue(venue).await
    }

    async fn has_currency(&self, currency: &Currency) -> Result<bool, StoreError> {
        self.inner.has_currency(currency).await
    }

    async fn find_listing(
        &self,
        venue: &VenueId,
        base: &Currency,
        quote: &Currency,
    ) -> Result<Option<Listing>, StoreError> {
        self.inner.find_listing(venue, base, quote).await
    }

    async fn listings(&self, venue: &VenueId) -> Result<Vec<Listing>, StoreError> {
        if self.listings_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("listings unavailable".to_string()));
        }
        self.inner.listings(venue).await
    }

    async fn latest_trades(&self, listing: &Listing) -> Result<Vec<Trade>, StoreError> {
        if self.broken_history.contains(listing) {
            return Err(StoreError::Backend(format!("history of {listing} unavailable")));
        }
        self.inner.latest_trades(listing).await
    }

    async fn trades_page(
        &self,
        query: &TradeQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        self.inner.trades_page(query, offset, limit).await
    }
}

pub fn bitfinex() -> VenueId {
    VenueId::new("bitfinex")
}

pub fn btc_usd() -> Listing {
    Listing::new(bitfinex(), Currency::new("btc"), Currency::new("usd"))
}

pub fn ltc_usd() -> Listing {
    Listing::new(bitfinex(), Currency::new("ltc"), Currency::new("usd"))
}

pub fn ltc_btc() -> Listing {
    Listing::new(bitfinex(), Currency::new("ltc"), Currency::new("btc"))
}

/// Timestamp `secs` seconds after the Unix epoch.
pub fn at(secs: i64) -> Timestamp {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn remote(secs: i64, id: RemoteId) -> RemoteTrade {
    remote_with_key(secs, &id.to_string())
}

pub fn remote_with_key(secs: i64, key: &str) -> RemoteTrade {
    RemoteTrade {
        remote_id: key.to_string(),
        timestamp: at(secs),
        price: udec64!(100.5),
        quantity: udec64!(0.25),
    }
}

pub fn trade(listing: &Listing, secs: i64, id: RemoteId) -> Trade {
    trade_with_key(listing, secs, &id.to_string())
}

pub fn trade_with_key(listing: &Listing, secs: i64, key: &str) -> Trade {
    Trade::new(listing.clone(), at(secs), key, udec64!(100.5), udec64!(0.25))
}

/// Stores the listing along with its venue and currencies, if missing.
pub async fn seed_listing<S>(store: &S, listing: &Listing)
where
    S: TradeStore + ?Sized,
{
    SeedData::new()
        .listing(
            listing.venue().clone(),
            listing.base().clone(),
            listing.quote().clone(),
        )
        .load(store, InitMode::Update)
        .await
        .unwrap();
}
