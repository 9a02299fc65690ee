use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::Cursor;
use crate::{
    error::{StoreError, VenueError},
    publish::Publisher,
    scheduler::{Job, Next},
    store::TradeStore,
    types::{Listing, MarketDataError, MarketEvent, Trade},
    venue::TradeSource,
};

/// Outcome of a successful polling cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the venue.
    pub fetched: usize,

    /// Records published as new trades.
    pub forwarded: usize,

    /// Records dropped because of an unparsable remote identifier.
    pub invalid: usize,
}

/// Polling state of a single listing.
///
/// Every run fetches the venue trades since the cursor, publishes those
/// with a remote identifier above the cursor and moves the cursor along.
/// As a [`Job`] it always asks to be requeued, whatever the outcome.
pub struct FetchTask {
    listing: Listing,
    source: Arc<dyn TradeSource>,
    publisher: Arc<dyn Publisher>,
    cursor: Cursor,
    consecutive_failures: u32,
}

impl FetchTask {
    /// Creates the task, recovering its cursor from the persisted history.
    pub async fn new<S>(
        listing: Listing,
        store: &S,
        source: Arc<dyn TradeSource>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, StoreError>
    where
        S: TradeStore + ?Sized,
    {
        let cursor = Cursor::recover(store, &listing).await?;
        info!(
            %listing,
            cursor_timestamp = %cursor.timestamp(),
            cursor_remote_id = cursor.remote_id(),
            "Cursor recovered"
        );
        Ok(Self::with_cursor(listing, cursor, source, publisher))
    }

    pub fn with_cursor(
        listing: Listing,
        cursor: Cursor,
        source: Arc<dyn TradeSource>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            listing,
            source,
            publisher,
            cursor,
            consecutive_failures: 0,
        }
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Number of failed cycles since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Runs one fetch-filter-publish cycle.
    ///
    /// A failed fetch leaves the cursor untouched and is published as
    /// [`MarketEvent::Error`] before being returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, VenueError> {
        let trades = match self
            .source
            .fetch_trades(&self.listing, self.cursor.timestamp())
            .await
        {
            Ok(trades) => trades,
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    listing = %self.listing,
                    %e,
                    consecutive_failures = self.consecutive_failures,
                    "Could not fetch trades"
                );
                self.publisher.publish(MarketEvent::Error(MarketDataError::new(
                    self.listing.clone(),
                    &e,
                )));
                return Err(e);
            }
        };
        self.consecutive_failures = 0;

        let mut report = CycleReport {
            fetched: trades.len(),
            ..Default::default()
        };
        for remote in trades {
            let remote_id = match remote.parse_remote_id() {
                Ok(id) => id,
                Err(e) => {
                    report.invalid += 1;
                    warn!(
                        listing = %self.listing,
                        remote_id = %remote.remote_id,
                        %e,
                        "Skipping trade with invalid remote identifier"
                    );
                    continue;
                }
            };
            if !self.cursor.is_new(remote_id) {
                continue;
            }
            let timestamp = remote.timestamp;
            if timestamp < self.cursor.timestamp() {
                debug!(
                    listing = %self.listing,
                    remote_id,
                    %timestamp,
                    cursor_timestamp = %self.cursor.timestamp(),
                    "Cursor timestamp moves backwards"
                );
            }
            self.publisher.publish(MarketEvent::Trade(Trade::from_remote(
                self.listing.clone(),
                remote,
            )));
            self.cursor.advance(timestamp, remote_id);
            report.forwarded += 1;
        }

        if report.forwarded > 0 {
            debug!(
                listing = %self.listing,
                fetched = report.fetched,
                forwarded = report.forwarded,
                cursor_remote_id = self.cursor.remote_id(),
                "Trades forwarded"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl Job for FetchTask {
    fn name(&self) -> String {
        self.listing.to_string()
    }

    async fn run(&mut self) -> Next {
        // Errors are already published and logged by the cycle
        let _ = self.run_cycle().await;
        Next::Requeue
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::{
        store::{Entity, MemoryStore},
        testing::{self, FailingStore, RecordingPublisher, ScriptedSource},
    };

    fn task(cursor: Cursor) -> (FetchTask, Arc<ScriptedSource>, Arc<RecordingPublisher>) {
        let source = Arc::new(ScriptedSource::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let task = FetchTask::with_cursor(
            testing::btc_usd(),
            cursor,
            source.clone(),
            publisher.clone(),
        );
        (task, source, publisher)
    }

    #[tokio::test]
    async fn test_forwards_strictly_increasing_only() {
        let (mut task, source, publisher) = task(Cursor::new(testing::at(50), 7));
        source.push_ok(
            task.listing(),
            vec![
                testing::remote(60, 5),
                testing::remote(61, 7),
                testing::remote(62, 9),
                testing::remote(63, 12),
            ],
        );

        let report = assert_ok!(task.run_cycle().await);
        assert_eq!(
            report,
            CycleReport {
                fetched: 4,
                forwarded: 2,
                invalid: 0
            }
        );
        assert_eq!(publisher.forwarded_ids(), vec![9, 12]);
        assert_eq!(task.cursor(), Cursor::new(testing::at(63), 12));
        assert_eq!(source.calls(task.listing()), vec![testing::at(50)]);
    }

    #[tokio::test]
    async fn test_cursor_advances_per_record() {
        let (mut task, source, publisher) = task(Cursor::BEGINNING);
        source.push_ok(
            task.listing(),
            vec![
                testing::remote(10, 1),
                testing::remote_with_key(11, "bogus"),
                testing::remote(12, 3),
            ],
        );

        let report = assert_ok!(task.run_cycle().await);
        assert_eq!(report.invalid, 1);
        assert_eq!(publisher.forwarded_ids(), vec![1, 3]);
        assert_eq!(task.cursor(), Cursor::new(testing::at(12), 3));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_cursor() {
        let initial = Cursor::new(testing::at(100), 42);
        let (mut task, source, publisher) = task(initial);
        source.push_err(task.listing(), VenueError::Transport("unreachable".into()));

        assert_err!(task.run_cycle().await);
        assert_eq!(task.cursor(), initial);
        assert_eq!(task.consecutive_failures(), 1);

        let errors = publisher.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(&errors[0].listing, task.listing());
        assert!(errors[0].cause.contains("unreachable"));
        assert!(publisher.trades().is_empty());
    }

    #[tokio::test]
    async fn test_empty_fetch_publishes_nothing() {
        let initial = Cursor::new(testing::at(100), 42);
        let (mut task, source, publisher) = task(initial);
        source.push_ok(task.listing(), vec![]);

        let report = assert_ok!(task.run_cycle().await);
        assert_eq!(report, CycleReport::default());
        assert!(publisher.events().is_empty());
        assert_eq!(task.cursor(), initial);
    }

    #[tokio::test]
    async fn test_timestamp_follows_forwarded_record() {
        let (mut task, source, _) = task(Cursor::new(testing::at(100), 1));
        source.push_ok(task.listing(), vec![testing::remote(90, 2)]);

        assert_ok!(task.run_cycle().await);
        assert_eq!(task.cursor(), Cursor::new(testing::at(90), 2));
    }

    #[tokio::test]
    async fn test_job_always_requeues() {
        let (mut task, source, publisher) = task(Cursor::BEGINNING);
        source.push_err(task.listing(), VenueError::Timeout);
        source.push_ok(task.listing(), vec![testing::remote(1, 1)]);

        assert_eq!(task.run().await, Next::Requeue);
        assert_eq!(task.run().await, Next::Requeue);
        assert_eq!(task.consecutive_failures(), 0);
        assert_eq!(publisher.errors().len(), 1);
        assert_eq!(publisher.forwarded_ids(), vec![1]);
        assert_eq!(task.name(), "BTC.USD@BITFINEX");
    }

    #[tokio::test]
    async fn test_new_recovers_cursor() {
        let store = MemoryStore::new();
        let listing = testing::btc_usd();
        testing::seed_listing(&store, &listing).await;
        store
            .insert(vec![
                Entity::Trade(testing::trade(&listing, 100, 5)),
                Entity::Trade(testing::trade(&listing, 200, 9)),
            ])
            .await
            .unwrap();

        let source = Arc::new(ScriptedSource::new());
        let task = FetchTask::new(
            listing,
            &store,
            source,
            Arc::new(RecordingPublisher::new()),
        )
        .await
        .unwrap();
        assert_eq!(task.cursor(), Cursor::new(testing::at(200), 9));
    }

    #[tokio::test]
    async fn test_new_fails_when_history_unavailable() {
        let store = FailingStore::new();
        let listing = testing::btc_usd();
        testing::seed_listing(&store, &listing).await;
        store.break_history(&listing);

        let result = FetchTask::new(
            listing,
            &store,
            Arc::new(ScriptedSource::new()),
            Arc::new(RecordingPublisher::new()),
        )
        .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
