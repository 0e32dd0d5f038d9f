//! Crawler module for walking a group's topic history
//!
//! This module contains the core harvest logic, including:
//! - HTTP access to the topics and file endpoints
//! - Topic decoding and media/attachment extraction
//! - Task queues and worker loops
//! - The cursor walker and the binary downloader
//! - Overall run coordination

mod coordinator;
mod downloader;
mod fetcher;
mod parser;
mod scheduler;
mod walker;

pub use coordinator::{Crawler, RunOutcome};
pub use downloader::Downloader;
pub use fetcher::{build_http_client, decode_topics, ApiClient, PageFetch, USER_AGENT};
pub use parser::{
    sanitize_filename, AttachmentRef, Body, Envelope, FileInfo, ImageInfo, MediaRef, RecordKind,
    Topic, TopicsData,
};
pub use scheduler::{run_worker, JobGuard, TaskQueue, WorkerSignals};
pub use walker::{scan_page, PageJob, PageOutcome, PageScan, Walker};

use crate::config::{CrawlConfig, CrawlerSettings};

/// Runs a complete harvest with the default policies
///
/// This is the simplest entry point. It will:
/// 1. Create the output root
/// 2. Walk the topic timeline from the end bound back to the start bound
/// 3. Append every in-window topic to its monthly document
/// 4. Download media and attachments when enabled
/// 5. Report the final counters
///
/// Duplicates are skipped and existing documents are appended to. Use
/// [`Crawler`] directly to plug in another conflict resolver or progress sink.
pub async fn crawl(config: CrawlConfig, settings: CrawlerSettings) -> RunOutcome {
    Crawler::new(config, settings).run().await
}
