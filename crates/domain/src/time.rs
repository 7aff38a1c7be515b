//! Time helpers: wall-clock timestamps and second-based durations.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// UTC timestamp attached to state changes and snapshots.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a configured number of seconds into a [`Duration`].
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDuration`] for negative, NaN or
/// infinite values.
pub fn seconds(field: &'static str, value: f64) -> Result<Duration, ValidationError> {
    Duration::try_from_secs_f64(value).map_err(|_| ValidationError::InvalidDuration { field, value })
}
