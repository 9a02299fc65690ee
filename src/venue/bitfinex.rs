use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tracing::{trace, warn};
use url::Url;

use super::TradeSource;
use crate::{
    error::VenueError,
    num,
    types::{Listing, RemoteTrade, Timestamp},
};

/// Public REST endpoint of the venue.
pub const DEFAULT_BASE_URL: &str = "https://api.bitfinex.com/";

/// Default timeout of a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trade record of the `v1/trades/{symbol}` endpoint.
#[derive(Debug, serde::Deserialize)]
struct WireTrade {
    timestamp: i64,
    tid: u64,
    price: String,
    amount: String,
}

impl WireTrade {
    fn into_remote(self) -> Result<RemoteTrade, VenueError> {
        Ok(RemoteTrade {
            remote_id: self.tid.to_string(),
            timestamp: num::timestamp_from_secs(self.timestamp)?,
            price: num::parse_unsigned(&self.price)?,
            quantity: num::parse_unsigned(&self.amount)?,
        })
    }
}

/// [`TradeSource`] polling Bitfinex public trades.
#[derive(Clone, Debug)]
pub struct BitfinexSource {
    client: reqwest::Client,
    base_url: Url,
}

impl BitfinexSource {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Venue symbol of the listing, e.g. `btcusd`.
    pub fn symbol(listing: &Listing) -> String {
        format!("{}{}", listing.base(), listing.quote()).to_ascii_lowercase()
    }

    fn trades_url(&self, listing: &Listing) -> Result<Url, VenueError> {
        self.base_url
            .join(&format!("v1/trades/{}", Self::symbol(listing)))
            .map_err(|e| VenueError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TradeSource for BitfinexSource {
    async fn fetch_trades(
        &self,
        listing: &Listing,
        since: Timestamp,
    ) -> Result<Vec<RemoteTrade>, VenueError> {
        let url = self.trades_url(listing)?;
        let body = self
            .client
            .get(url)
            .query(&[("timestamp", since.timestamp())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let wire: Vec<WireTrade> = serde_json::from_str(&body)?;
        trace!(%listing, count = wire.len(), "Trades received");

        // Endpoint returns the most recent trades first
        Ok(wire
            .into_iter()
            .sorted_by_key(|t| t.tid)
            .filter_map(|t| {
                let tid = t.tid;
                t.into_remote()
                    .inspect_err(|e| warn!(%listing, tid, %e, "Skipping malformed trade record"))
                    .ok()
            })
            .collect())
    }
}
