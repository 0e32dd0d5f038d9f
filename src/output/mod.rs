//! Output module for topic documents, downloaded binaries and progress
//!
//! This module handles:
//! - Rendering topics as markdown blocks
//! - Appending blocks to monthly documents, settling file conflicts once per run
//! - Writing downloaded media and attachments
//! - Reporting progress and run results

mod binary;
mod document;
mod markdown;
mod progress;
pub mod stats;
mod traits;

pub use binary::FsBinarySink;
pub use document::{DocumentDecision, DocumentWriter, FsDocumentSink};
pub use markdown::{render_topic, BLOCK_SEPARATOR};
pub use progress::TracingProgress;
pub use stats::print_outcome;
pub use traits::{
    BinarySink, Category, DocumentSink, OutputError, OutputResult, ProgressSink, Severity,
};
