//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp carried by messages and events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds since the Unix epoch for `ts`.
#[must_use]
pub fn as_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}
