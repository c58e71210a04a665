//! Epoch Clock
//!
//! Integer time since the Unix epoch, as used by the login handshake.

use chrono::{DateTime, Utc};

/// Milliseconds since the Unix epoch for the current instant.
#[must_use]
pub fn now_millis() -> i64 {
    millis_since_epoch(Utc::now())
}

/// Milliseconds since the Unix epoch for `time`.
#[must_use]
pub fn millis_since_epoch(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Whole seconds since the Unix epoch for `time`.
#[must_use]
pub fn seconds_since_epoch(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}
