use crate::types;

/// Error returned by a venue adapter while fetching trades.
///
/// All variants are transient from the ingestion loop point of view:
/// the failed cycle is reported and the listing keeps being polled.
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}: {1}")]
    Status(u16, String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid trade record {0}: {1}")]
    InvalidRecord(String, String),
}

/// Error returned by the persistence store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate entity: {0}")]
    Duplicate(String),

    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Error returned by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("rate limiter is stopped")]
    Stopped,

    #[error("invalid rate: {0}")]
    InvalidRate(String),
}

/// Error setting up polling of a single listing.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cursor recovery failed for {0}: {1}")]
    Recovery(types::Listing, StoreError),

    #[error("scheduling failed for {0}: {1}")]
    Scheduling(types::Listing, SchedulerError),
}

impl From<reqwest::Error> for VenueError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_decode() {
            Self::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Status(status.as_u16(), value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
