//! Timeline handling for the topic walk
//!
//! This module provides the time arithmetic the walk depends on:
//! - Converting operator-supplied bounds into the API's timestamp form
//! - Classifying topics against the configured time window
//! - Deriving the next pagination cursor from a page

mod bounds;
mod cursor;
mod window;

pub use bounds::{parse_time_arg, BoundKind};
pub use cursor::{next_cursor, parse_api_timestamp, shift_millis};
pub use window::{TimeWindow, WindowPosition};

/// Offset the API reports every timestamp in
pub const API_OFFSET: &str = "+0800";

/// chrono format matching `2024-01-31T23:59:59.999+0800`
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
