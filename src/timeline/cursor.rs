//! Pagination cursor arithmetic
//!
//! The topics endpoint treats `end_time` as an inclusive upper bound, so the
//! walk emulates an exclusive cursor by stepping one millisecond below the
//! oldest topic of the previous page.

use crate::timeline::API_TIMESTAMP_FORMAT;
use crate::{TimestampError, TimestampResult};
use chrono::{DateTime, Duration, FixedOffset};

/// Length of `YYYY-MM-DDTHH:MM:SS.mmm+HHMM`
const API_TIMESTAMP_LEN: usize = 28;

/// Parses an API timestamp, insisting on millisecond precision and a `+HHMM` offset
pub fn parse_api_timestamp(timestamp: &str) -> TimestampResult<DateTime<FixedOffset>> {
    if timestamp.len() != API_TIMESTAMP_LEN {
        return Err(TimestampError::Format(timestamp.to_string()));
    }
    DateTime::<FixedOffset>::parse_from_str(timestamp, API_TIMESTAMP_FORMAT)
        .map_err(|_| TimestampError::Format(timestamp.to_string()))
}

/// Shifts an API timestamp by `delta_ms` milliseconds, keeping its offset
///
/// Borrowing and carrying propagate through seconds, minutes, hours and days.
///
/// # Example
///
/// ```
/// use zsxq_harvest::timeline::shift_millis;
///
/// let shifted = shift_millis("2024-01-01T00:00:00.000+0800", -1).unwrap();
/// assert_eq!(shifted, "2023-12-31T23:59:59.999+0800");
/// ```
pub fn shift_millis(timestamp: &str, delta_ms: i64) -> TimestampResult<String> {
    let parsed = parse_api_timestamp(timestamp)?;
    let shifted = parsed
        .checked_add_signed(Duration::milliseconds(delta_ms))
        .ok_or_else(|| TimestampError::OutOfRange(timestamp.to_string()))?;
    Ok(shifted.format(API_TIMESTAMP_FORMAT).to_string())
}

/// Derives the cursor for the page after the one ending at `last_create_time`
pub fn next_cursor(last_create_time: &str) -> TimestampResult<String> {
    shift_millis(last_create_time, -1)
}
