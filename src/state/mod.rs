//! State module for tracking a harvest run
//!
//! This module provides the shared state workers touch while a run is in flight.
//!
//! # Components
//!
//! - `RunState`: Owns the seen-set, the counters and the cancellation token of one run
//! - `SeenSet`: Creation times already accepted, for intra-run duplicate detection
//! - `RunCounters`: Saved records, media and attachments
//! - `ConflictResolver`: Pluggable decisions on duplicates and existing documents

mod conflict;
mod run_state;

// Re-export main types
pub use conflict::{ConflictResolver, PolicyResolver, PromptResolver};
pub use run_state::{CounterSnapshot, RunCounters, RunState, SeenSet};
