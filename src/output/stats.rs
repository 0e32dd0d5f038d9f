//! Run statistics display
//!
//! This module formats the final counters of a run for the terminal.

use crate::crawler::RunOutcome;
use crate::state::CounterSnapshot;

/// Formats counters as the one-line summary used in run results
pub fn format_counters(counters: &CounterSnapshot) -> String {
    format!(
        "{} records, {} media, {} attachments",
        counters.records, counters.media, counters.attachments
    )
}

/// Prints a run outcome to stdout in a formatted manner
pub fn print_outcome(outcome: &RunOutcome) {
    println!("=== Harvest Result ===\n");

    println!(
        "Status: {}",
        if outcome.success { "completed" } else { "failed" }
    );
    println!("Message: {}", outcome.message);
    println!();

    println!("Counters:");
    println!("  Records saved: {}", outcome.counters.records);
    println!("  Media saved: {}", outcome.counters.media);
    println!("  Attachments saved: {}", outcome.counters.attachments);
}
