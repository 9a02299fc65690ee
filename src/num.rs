use chrono::DateTime;
use fastnum::{UD64, decimal::Context};

use crate::{error::VenueError, types::Timestamp};

/// Parses a venue decimal string into an unsigned decimal.
///
/// Venues occasionally report sell-side amounts with a leading minus,
/// the sign is dropped since the side is not tracked.
pub fn parse_unsigned(value: &str) -> Result<UD64, VenueError> {
    let trimmed = value.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    UD64::from_str(unsigned, Context::default())
        .map_err(|e| VenueError::InvalidRecord(value.to_string(), e.to_string()))
}

/// Converts venue seconds since the Unix epoch into a [`Timestamp`].
pub fn timestamp_from_secs(secs: i64) -> Result<Timestamp, VenueError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| VenueError::InvalidRecord(secs.to_string(), "timestamp out of range".into()))
}
