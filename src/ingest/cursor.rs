use tracing::warn;

use crate::{
    error::StoreError,
    store::TradeStore,
    types::{Listing, RemoteId, Timestamp, Trade},
};

/// Resume point of a listing: the highest timestamp and the highest
/// remote identifier seen so far.
///
/// The identifier decides what gets forwarded, the timestamp only bounds
/// the venue query window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    timestamp: Timestamp,
    remote_id: RemoteId,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::BEGINNING
    }
}

impl Cursor {
    /// Position before any trade.
    pub const BEGINNING: Self = Self {
        timestamp: Timestamp::UNIX_EPOCH,
        remote_id: 0,
    };

    pub fn new(timestamp: Timestamp, remote_id: RemoteId) -> Self {
        Self {
            timestamp,
            remote_id,
        }
    }

    /// Derives the cursor from the listing's most recent persisted trades.
    pub async fn recover<S>(store: &S, listing: &Listing) -> Result<Self, StoreError>
    where
        S: TradeStore + ?Sized,
    {
        let latest = store.latest_trades(listing).await?;
        Ok(Self::from_history(&latest))
    }

    /// Takes the maximum timestamp and the maximum remote identifier over
    /// the given trades, independently of each other.
    ///
    /// Trades whose remote key is not a valid identifier contribute their
    /// timestamp only.
    pub fn from_history<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        trades.into_iter().fold(Self::BEGINNING, |cursor, trade| {
            let remote_id = match trade.remote_id() {
                Ok(id) => cursor.remote_id.max(id),
                Err(e) => {
                    warn!(
                        listing = %trade.listing(),
                        remote_key = trade.remote_key(),
                        %e,
                        "Ignoring persisted trade with invalid remote key"
                    );
                    cursor.remote_id
                }
            };
            Self {
                timestamp: cursor.timestamp.max(trade.timestamp()),
                remote_id,
            }
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn remote_id(&self) -> RemoteId {
        self.remote_id
    }

    /// Whether a trade with the given identifier has not been seen yet.
    pub fn is_new(&self, remote_id: RemoteId) -> bool {
        remote_id > self.remote_id
    }

    /// Moves the cursor to a forwarded trade.
    ///
    /// The timestamp follows the trade even if it goes backwards, which
    /// only widens the next query window.
    pub(crate) fn advance(&mut self, timestamp: Timestamp, remote_id: RemoteId) {
        self.timestamp = timestamp;
        self.remote_id = remote_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{Entity, MemoryStore},
        testing,
    };

    #[test]
    fn test_maxima_taken_independently() {
        let listing = testing::btc_usd();
        let history = [
            testing::trade(&listing, 100, 5),
            testing::trade(&listing, 200, 9),
            testing::trade(&listing, 150, 7),
        ];
        let cursor = Cursor::from_history(&history);
        assert_eq!(cursor.timestamp(), testing::at(200));
        assert_eq!(cursor.remote_id(), 9);

        // Identifier order need not follow timestamps
        let skewed = [
            testing::trade(&listing, 300, 4),
            testing::trade(&listing, 200, 11),
        ];
        assert_eq!(
            Cursor::from_history(&skewed),
            Cursor::new(testing::at(300), 11)
        );
    }

    #[test]
    fn test_empty_history_is_beginning() {
        assert_eq!(Cursor::from_history(std::iter::empty()), Cursor::BEGINNING);
        assert_eq!(Cursor::default().remote_id(), 0);
        assert_eq!(Cursor::default().timestamp().timestamp(), 0);
    }

    #[test]
    fn test_invalid_remote_keys_are_ignored() {
        let listing = testing::btc_usd();
        let history = [
            testing::trade(&listing, 100, 5),
            testing::trade_with_key(&listing, 400, "x-17"),
        ];
        assert_eq!(
            Cursor::from_history(&history),
            Cursor::new(testing::at(400), 5)
        );
    }

    #[tokio::test]
    async fn test_recover_from_store() {
        let store = MemoryStore::new();
        let (btc, ltc) = (testing::btc_usd(), testing::ltc_usd());
        testing::seed_listing(&store, &btc).await;
        testing::seed_listing(&store, &ltc).await;
        assert_eq!(Cursor::recover(&store, &btc).await.unwrap(), Cursor::BEGINNING);

        store
            .insert(vec![
                Entity::Trade(testing::trade(&btc, 100, 5)),
                Entity::Trade(testing::trade(&btc, 200, 8)),
                Entity::Trade(testing::trade(&btc, 200, 9)),
                Entity::Trade(testing::trade(&btc, 150, 7)),
                Entity::Trade(testing::trade(&ltc, 500, 50)),
            ])
            .await
            .unwrap();
        assert_eq!(
            Cursor::recover(&store, &btc).await.unwrap(),
            Cursor::new(testing::at(200), 9)
        );
    }
}
