//! Trade ingester orchestration.
//!
//! Seeds the store, starts the recorder and the polling jobs, then runs
//! until Ctrl-C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use trade_ingest::{
    ingest, publish, recorder,
    scheduler::RateLimiter,
    seed::SeedData,
    store::MemoryStore,
    venue::{TradeSource, bitfinex::BitfinexSource},
};
use crate::{
    config::{EnvConfig, IngestConfig},
    error::{Error, Result},
};

/// Trade ingester.
pub struct TradeIngester {
    config: IngestConfig,
    store: Arc<MemoryStore>,
    source: Arc<dyn TradeSource>,
}

impl TradeIngester {
    pub fn try_new(env_config: &EnvConfig, config: IngestConfig) -> Result<Self> {
        let venue_url = env_config.venue_url()?;
        info!(
            venue = %config.venue.id(),
            %venue_url,
            queries = config.rate.queries(),
            per = ?config.rate.per(),
            mode = ?config.mode,
            "Initializing trade ingester"
        );
        let source = BitfinexSource::new(venue_url, env_config.request_timeout())?;

        Ok(Self {
            config,
            store: Arc::new(MemoryStore::new()),
            source: Arc::new(source),
        })
    }

    /// Runs until Ctrl-C, then stops polling and flushes the recorder.
    pub async fn run(&self) -> Result<()> {
        let listings = SeedData::for_venue(&self.config.venue)
            .load(self.store.as_ref(), self.config.mode)
            .await?;
        info!(listings = listings.len(), "Seed data loaded");

        let (publisher, events) = publish::channel();
        let recorder_cancel = CancellationToken::new();
        let recorder = tokio::spawn({
            let store = self.store.clone();
            let cancel = recorder_cancel.clone();
            async move { recorder::run(events, store.as_ref(), cancel).await }
        });

        let limiter = RateLimiter::start(self.config.rate);
        let report = ingest::start(
            &self.config.venue,
            self.store.as_ref(),
            self.source.clone(),
            Arc::new(publisher),
            &limiter,
        )
        .await?;
        for failure in &report.failed {
            warn!(%failure, "Listing skipped");
        }

        let signal = if report.started.is_empty() {
            Err(Error::NothingToIngest)
        } else {
            tokio::signal::ctrl_c().await.map_err(Error::from)
        };

        info!("Shutting down");
        limiter.shutdown().await;
        recorder_cancel.cancel();
        match recorder.await {
            Ok(stats) => info!(
                trades_stored = stats.trades_stored,
                store_failures = stats.store_failures,
                errors_seen = stats.errors_seen,
                "Trade ingester stopped"
            ),
            Err(e) => error!(%e, "Recorder task failed"),
        }
        signal
    }
}

#[cfg(test)]
mod tests {
    use trade_ingest::{Venue, scheduler::Rate, seed::InitMode};

    use super::*;

    fn config() -> IngestConfig {
        IngestConfig {
            venue: Venue::bitfinex(),
            rate: Rate::new(1, std::time::Duration::from_secs(1)).unwrap(),
            mode: InitMode::Update,
        }
    }

    #[test]
    fn test_invalid_venue_url() {
        let env = EnvConfig {
            venue_url: Some("not a url".to_string()),
            request_timeout_seconds: None,
        };

        assert!(matches!(
            TradeIngester::try_new(&env, config()),
            Err(Error::InvalidVenueUrl(_))
        ));
    }

    #[test]
    fn test_default_venue_url() {
        let env = EnvConfig {
            venue_url: None,
            request_timeout_seconds: Some(5),
        };

        assert!(TradeIngester::try_new(&env, config()).is_ok());
    }
}
