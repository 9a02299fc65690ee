use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use trade_ingest::{
    Venue,
    error::VenueError,
    ingest::{self, Cursor},
    publish, recorder,
    scheduler::{Rate, RateLimiter},
    seed::{InitMode, SeedData},
    store::{MemoryStore, TradeStore},
    testing::{self, RecordingPublisher, ScriptedSource},
    types::{Listing, RemoteTrade, Timestamp},
    venue::TradeSource,
};

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    SeedData::for_venue(&Venue::bitfinex())
        .load(store.as_ref(), InitMode::Reset)
        .await
        .unwrap();
    store
}

/// A failed cycle is reported once and the listing keeps being polled
/// from the same cursor.
#[tokio::test(start_paused = true)]
async fn test_failed_cycle_is_retried() {
    let store = seeded_store().await;
    let listing = testing::btc_usd();
    let source = Arc::new(ScriptedSource::new());
    source.push_err(&listing, VenueError::Timeout);
    source.push_ok(&listing, vec![testing::remote(10, 1), testing::remote(11, 2)]);
    let publisher = Arc::new(RecordingPublisher::new());

    let limiter = RateLimiter::start(Rate::new(1, Duration::from_millis(100)).unwrap());
    let report = ingest::start(
        &Venue::bitfinex(),
        store.as_ref(),
        source.clone(),
        publisher.clone(),
        &limiter,
    )
    .await
    .unwrap();
    assert_eq!(report.started, Venue::bitfinex().listings());
    assert!(report.failed.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    limiter.shutdown().await;

    let errors = publisher.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].listing, listing);
    assert_eq!(publisher.forwarded_ids(), vec![1, 2]);

    let calls = source.calls(&listing);
    assert!(calls.len() >= 3);
    assert_eq!(calls[0], Cursor::BEGINNING.timestamp());
    assert_eq!(calls[1], Cursor::BEGINNING.timestamp());
    assert!(calls[2..].iter().all(|since| *since == testing::at(11)));
}

/// Recorded trades seed the cursor of a later ingestion run.
#[tokio::test(start_paused = true)]
async fn test_recorded_trades_resume_polling() {
    let store = seeded_store().await;
    let listing = testing::ltc_btc();

    let source = Arc::new(ScriptedSource::new());
    source.push_ok(&listing, vec![testing::remote(100, 5), testing::remote(200, 9)]);
    let (publisher, events) = publish::channel();
    let cancel = CancellationToken::new();
    let recorder = tokio::spawn({
        let store = store.clone();
        let cancel = cancel.clone();
        async move { recorder::run(events, store.as_ref(), cancel).await }
    });

    let limiter = RateLimiter::start(Rate::new(3, Duration::from_secs(1)).unwrap());
    ingest::start(
        &Venue::bitfinex(),
        store.as_ref(),
        source,
        Arc::new(publisher),
        &limiter,
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    limiter.shutdown().await;
    cancel.cancel();

    let stats = recorder.await.unwrap();
    assert_eq!(stats.trades_stored, 2);
    assert_eq!(store.latest_trades(&listing).await.unwrap().len(), 1);

    // Second run over the same store
    let source = Arc::new(ScriptedSource::new());
    source.push_ok(&listing, vec![testing::remote(200, 9), testing::remote(210, 10)]);
    let publisher = Arc::new(RecordingPublisher::new());
    let limiter = RateLimiter::start(Rate::new(3, Duration::from_secs(1)).unwrap());
    ingest::start(
        &Venue::bitfinex(),
        store.as_ref(),
        source.clone(),
        publisher.clone(),
        &limiter,
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    limiter.shutdown().await;

    assert_eq!(source.calls(&listing)[0], testing::at(200));
    assert_eq!(
        source.calls(&testing::btc_usd())[0],
        Cursor::BEGINNING.timestamp()
    );
    assert_eq!(publisher.forwarded_ids(), vec![10]);
}

/// Source recording when each fetch started.
#[derive(Default)]
struct TimedSource {
    starts: Mutex<Vec<(Listing, Instant)>>,
}

#[async_trait]
impl TradeSource for TimedSource {
    async fn fetch_trades(
        &self,
        listing: &Listing,
        _since: Timestamp,
    ) -> Result<Vec<RemoteTrade>, VenueError> {
        self.starts.lock().push((listing.clone(), Instant::now()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(vec![])
    }
}

/// All listings share one request budget and get polled in turn.
#[tokio::test(start_paused = true)]
async fn test_listings_share_request_budget() {
    let store = seeded_store().await;
    let source = Arc::new(TimedSource::default());
    let per = Duration::from_secs(1);

    let limiter = RateLimiter::start(Rate::new(2, per).unwrap());
    ingest::start(
        &Venue::bitfinex(),
        store.as_ref(),
        source.clone(),
        Arc::new(RecordingPublisher::new()),
        &limiter,
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    limiter.shutdown().await;

    let starts = source.starts.lock().clone();
    assert!(starts.len() >= 18);
    for window in starts.windows(3) {
        assert!(window[2].1 - window[0].1 >= per);
    }

    let mut per_listing: HashMap<Listing, usize> = HashMap::new();
    for (listing, _) in &starts {
        *per_listing.entry(listing.clone()).or_default() += 1;
    }
    assert_eq!(per_listing.len(), 3);
    let (min, max) = (
        per_listing.values().min().unwrap(),
        per_listing.values().max().unwrap(),
    );
    assert!(max - min <= 1);
}
