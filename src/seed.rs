//! Reference data the ingestion loop relies on.
//!
//! [`SeedData`] is an explicit registry of venues, currencies and listings.
//! [`SeedData::load`] persists it according to the [`InitMode`] passed in.

use tracing::{debug, info};

use crate::{
    Venue,
    error::StoreError,
    store::{Entity, TradeStore},
    types::{Currency, Listing, VenueId},
};

/// How reference data gets persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InitMode {
    /// Store is expected to be empty, everything is inserted in a single
    /// transaction.
    Reset,

    /// Store may already hold some of the data, only missing entities are
    /// inserted.
    #[default]
    Update,
}

/// Registry of reference entities to persist.
#[derive(Clone, Debug, Default)]
pub struct SeedData {
    venues: Vec<VenueId>,
    currencies: Vec<Currency>,
    listings: Vec<Listing>,
}

impl SeedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the venue and all of its configured pairs.
    pub fn for_venue(venue: &Venue) -> Self {
        venue
            .pairs()
            .iter()
            .fold(Self::new().venue(venue.id().clone()), |seed, (base, quote)| {
                seed.listing(venue.id().clone(), base.clone(), quote.clone())
            })
    }

    pub fn venue(mut self, venue: VenueId) -> Self {
        if !self.venues.contains(&venue) {
            self.venues.push(venue);
        }
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        if !self.currencies.contains(&currency) {
            self.currencies.push(currency);
        }
        self
    }

    /// Registers the listing along with its venue and currencies.
    pub fn listing(self, venue: VenueId, base: Currency, quote: Currency) -> Self {
        let mut seed = self
            .venue(venue.clone())
            .currency(base.clone())
            .currency(quote.clone());
        let listing = Listing::new(venue, base, quote);
        if !seed.listings.contains(&listing) {
            seed.listings.push(listing);
        }
        seed
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// All registered entities, referenced data first.
    pub fn entities(&self) -> Vec<Entity> {
        self.venues
            .iter()
            .cloned()
            .map(Entity::Venue)
            .chain(self.currencies.iter().cloned().map(Entity::Currency))
            .chain(self.listings.iter().cloned().map(Entity::Listing))
            .collect()
    }

    /// Persists the registry, returning the registered listings as stored.
    pub async fn load<S>(&self, store: &S, mode: InitMode) -> Result<Vec<Listing>, StoreError>
    where
        S: TradeStore + ?Sized,
    {
        match mode {
            InitMode::Reset => {
                store.insert(self.entities()).await?;
                info!(
                    venues = self.venues.len(),
                    currencies = self.currencies.len(),
                    listings = self.listings.len(),
                    "Reference data inserted"
                );
                Ok(self.listings.clone())
            }
            InitMode::Update => {
                for venue in &self.venues {
                    find_or_create_venue(store, venue).await?;
                }
                for currency in &self.currencies {
                    find_or_create_currency(store, currency).await?;
                }
                let mut listings = Vec::with_capacity(self.listings.len());
                for listing in &self.listings {
                    listings.push(
                        find_or_create_listing(
                            store,
                            listing.venue(),
                            listing.base(),
                            listing.quote(),
                        )
                        .await?,
                    );
                }
                Ok(listings)
            }
        }
    }
}

async fn find_or_create_venue<S>(store: &S, venue: &VenueId) -> Result<(), StoreError>
where
    S: TradeStore + ?Sized,
{
    if !store.has_venue(venue).await? {
        store.insert(vec![Entity::Venue(venue.clone())]).await?;
        debug!(%venue, "Venue created");
    }
    Ok(())
}

async fn find_or_create_currency<S>(store: &S, currency: &Currency) -> Result<(), StoreError>
where
    S: TradeStore + ?Sized,
{
    if !store.has_currency(currency).await? {
        store.insert(vec![Entity::Currency(currency.clone())]).await?;
        debug!(%currency, "Currency created");
    }
    Ok(())
}

/// Looks the listing up, inserting it if it is not stored yet.
///
/// Venue and currencies have to be stored already.
pub async fn find_or_create_listing<S>(
    store: &S,
    venue: &VenueId,
    base: &Currency,
    quote: &Currency,
) -> Result<Listing, StoreError>
where
    S: TradeStore + ?Sized,
{
    if let Some(listing) = store.find_listing(venue, base, quote).await? {
        return Ok(listing);
    }
    let listing = Listing::new(venue.clone(), base.clone(), quote.clone());
    store.insert(vec![Entity::Listing(listing.clone())]).await?;
    debug!(%listing, "Listing created");
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_registry_deduplicates() {
        let seed = SeedData::new()
            .listing(VenueId::new("x"), Currency::new("btc"), Currency::new("usd"))
            .listing(VenueId::new("x"), Currency::new("ltc"), Currency::new("usd"))
            .listing(VenueId::new("x"), Currency::new("btc"), Currency::new("usd"));
        assert_eq!(seed.listings().len(), 2);
        let entities = seed.entities();
        assert_eq!(entities.len(), 1 + 3 + 2);
        assert!(matches!(entities[0], Entity::Venue(_)));
        assert!(matches!(entities[5], Entity::Listing(_)));
    }

    #[test]
    fn test_bitfinex_registry() {
        let seed = SeedData::for_venue(&Venue::bitfinex());
        let names: Vec<_> = seed.listings().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["BTC.USD@BITFINEX", "LTC.USD@BITFINEX", "LTC.BTC@BITFINEX"]
        );
    }

    #[tokio::test]
    async fn test_reset_then_update_is_idempotent() {
        let store = MemoryStore::new();
        let seed = SeedData::for_venue(&Venue::bitfinex());
        let listings = seed.load(&store, InitMode::Reset).await.unwrap();
        assert_eq!(listings.len(), 3);

        // Reset expects an empty store
        assert!(matches!(
            seed.load(&store, InitMode::Reset).await,
            Err(StoreError::Duplicate(_))
        ));

        let again = assert_ok!(seed.load(&store, InitMode::Update).await);
        assert_eq!(again, listings);
        assert_eq!(
            store.listings(Venue::bitfinex().id()).await.unwrap(),
            listings
        );
    }

    #[tokio::test]
    async fn test_update_extends_existing_data() {
        let store = MemoryStore::new();
        let venue = VenueId::new("bitfinex");
        SeedData::new()
            .listing(venue.clone(), Currency::new("btc"), Currency::new("usd"))
            .load(&store, InitMode::Reset)
            .await
            .unwrap();

        let listing = assert_ok!(
            find_or_create_listing(&store, &venue, &Currency::new("usd"), &Currency::new("btc"))
                .await
        );
        assert_eq!(listing.to_string(), "USD.BTC@BITFINEX");

        let listings = SeedData::for_venue(&Venue::bitfinex())
            .load(&store, InitMode::Update)
            .await
            .unwrap();
        assert_eq!(listings.len(), 3);
        assert_eq!(store.listings(&venue).await.unwrap().len(), 4);
    }
}
