//! Error types for the trade ingester.

use trade_ingest::error::{StoreError, VenueError};

/// Main error type for the trade ingester.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid venue URL: {0}")]
    InvalidVenueUrl(#[from] url::ParseError),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No listing could be started")]
    NothingToIngest,

    #[error("Could not wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
