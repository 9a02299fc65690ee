//! Per-listing trade polling.
//!
//! # Architecture
//!
//! - [`Cursor`] - resume point of a listing, derived from persisted history
//! - [`FetchTask`] - one listing's polling state, a recurring
//!   [`crate::scheduler::Job`]
//! - [`start`] - creates a task for every listing of a venue and hands
//!   them over to the [`RateLimiter`]
//!
//! # Example
//!
//! ```ignore
//! let limiter = RateLimiter::start(Rate::new(1, Duration::from_secs(1))?);
//! let report = ingest::start(&venue, store.as_ref(), source, publisher, &limiter).await?;
//!
//! // Polling continues until the limiter is shut down
//! limiter.shutdown().await;
//! ```

mod cursor;
mod task;

pub use cursor::Cursor;
pub use task::{CycleReport, FetchTask};

use std::sync::Arc;

use futures::future;
use tracing::{error, info};

use crate::{
    Venue,
    error::{IngestError, StoreError},
    publish::Publisher,
    scheduler::RateLimiter,
    store::TradeStore,
    types::Listing,
    venue::TradeSource,
};

/// Outcome of [`start`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// Listings being polled.
    pub started: Vec<Listing>,

    /// Listings which could not be set up.
    pub failed: Vec<IngestError>,
}

/// Starts polling every stored listing of the venue.
///
/// Cursors are recovered concurrently. A listing whose cursor can not be
/// recovered, or which can not be submitted, is reported in
/// [`StartReport::failed`] without affecting the others. Failing to
/// enumerate the listings is an error.
pub async fn start<S>(
    venue: &Venue,
    store: &S,
    source: Arc<dyn TradeSource>,
    publisher: Arc<dyn Publisher>,
    limiter: &RateLimiter,
) -> Result<StartReport, StoreError>
where
    S: TradeStore + ?Sized,
{
    let listings = store.listings(venue.id()).await?;
    info!(venue = %venue.id(), listings = listings.len(), "Starting trade ingestion");

    let tasks = future::join_all(listings.into_iter().map(|listing| {
        let (source, publisher) = (source.clone(), publisher.clone());
        async move {
            FetchTask::new(listing.clone(), store, source, publisher)
                .await
                .map_err(|e| IngestError::Recovery(listing, e))
        }
    }))
    .await;

    let mut report = StartReport::default();
    for task in tasks {
        let submitted = task.and_then(|task| {
            let listing = task.listing().clone();
            match limiter.submit(Box::new(task)) {
                Ok(()) => Ok(listing),
                Err(e) => Err(IngestError::Scheduling(listing, e)),
            }
        });
        match submitted {
            Ok(listing) => report.started.push(listing),
            Err(e) => {
                error!(%e, "Listing not started");
                report.failed.push(e);
            }
        }
    }

    info!(
        started = report.started.len(),
        failed = report.failed.len(),
        "Trade ingestion started"
    );
    Ok(report)
}
