//! Downstream consumer persisting published trades.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    publish::EventReceiver,
    store::{Entity, TradeStore},
    types::MarketEvent,
};

/// Counters of a finished recorder run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub trades_stored: u64,
    pub store_failures: u64,
    pub errors_seen: u64,
}

/// Persists every published trade until cancelled or until all publishers
/// are gone.
///
/// A trade the store rejects is logged and dropped, recording goes on.
pub async fn run<S>(
    mut events: EventReceiver,
    store: &S,
    cancel: CancellationToken,
) -> RecorderStats
where
    S: TradeStore + ?Sized,
{
    let mut stats = RecorderStats::default();
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        record(event, store, &mut stats).await;
    }

    // Keep what was already published
    while let Some(event) = events.try_recv() {
        record(event, store, &mut stats).await;
    }

    info!(
        trades_stored = stats.trades_stored,
        store_failures = stats.store_failures,
        errors_seen = stats.errors_seen,
        "Recorder stopped"
    );
    stats
}

async fn record<S>(event: MarketEvent, store: &S, stats: &mut RecorderStats)
where
    S: TradeStore + ?Sized,
{
    match event {
        MarketEvent::Trade(trade) => {
            let (listing, remote_key) =
                (trade.listing().clone(), trade.remote_key().to_string());
            match store.insert(vec![Entity::Trade(trade)]).await {
                Ok(()) => stats.trades_stored += 1,
                Err(e) => {
                    stats.store_failures += 1;
                    error!(%listing, %remote_key, %e, "Could not store trade");
                }
            }
        }
        MarketEvent::Error(e) => {
            stats.errors_seen += 1;
            warn!(listing = %e.listing, cause = %e.cause, "Market data error");
        }
    }
}
