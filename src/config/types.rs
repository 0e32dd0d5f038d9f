use crate::timeline::{parse_time_arg, BoundKind, TimeWindow};
use crate::ConfigResult;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for zsxq-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlSection,
    #[serde(default)]
    pub crawler: CrawlerSettings,
    #[serde(default)]
    pub conflicts: ConflictSettings,
}

/// What to harvest and where to put it, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSection {
    /// Group identifier
    pub group: String,

    /// Opaque session credential, sent verbatim as the cookie header
    pub cookie: String,

    /// Inclusive start bound (`YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`), empty = unbounded
    #[serde(default)]
    pub start: String,

    /// Inclusive end bound (`YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`), empty = unbounded
    #[serde(default)]
    pub end: String,

    /// Download images referenced by topics
    #[serde(default)]
    pub media: bool,

    /// Download files attached to topics
    #[serde(default)]
    pub attachments: bool,

    /// Output root directory
    #[serde(default = "default_output")]
    pub output: String,
}

/// Tuning knobs for the crawl pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerSettings {
    /// Base URL of the REST API, ending with a slash
    pub api_base: String,

    /// Topics requested per page
    pub page_size: u32,

    /// How long an idle worker waits on its queue before re-checking cancellation
    pub poll_interval_ms: u64,

    /// Delay before retrying after a network error or malformed body
    pub retry_delay_ms: u64,

    /// Delay before retrying after the API reported a failure envelope
    pub failure_delay_ms: u64,

    /// Per-request network timeout
    pub request_timeout_secs: u64,

    /// Number of parallel image download workers
    pub media_workers: u32,

    /// Attempts per candidate URL before a download moves on
    pub download_attempts: u32,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.zsxq.com/v2/".to_string(),
            page_size: 30,
            poll_interval_ms: 1000,
            retry_delay_ms: 10_000,
            failure_delay_ms: 15_000,
            request_timeout_secs: 30,
            media_workers: 2,
            download_attempts: 3,
        }
    }
}

impl CrawlerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// How conflicts are settled when nobody supplies a resolver explicitly
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConflictSettings {
    pub on_duplicate: DuplicatePolicy,
    pub on_existing_document: ExistingDocumentPolicy,
}

/// Answer to "the same creation time appeared twice in this run"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Ask the operator
    #[default]
    Prompt,
    /// Stop the walk
    Abort,
    /// Skip the duplicate and keep walking
    Skip,
}

/// Answer to "the monthly document already exists on disk"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingDocumentPolicy {
    /// Ask the operator
    #[default]
    Prompt,
    /// Empty the document before the first write of this run
    Truncate,
    /// Keep existing content and append after it
    Append,
}

/// Immutable input of one harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub group: String,
    pub cookie: String,
    pub window: TimeWindow,
    pub media: bool,
    pub attachments: bool,
    pub output: PathBuf,
}

impl CrawlSection {
    /// Resolves the raw section into a [`CrawlConfig`], normalizing the time bounds
    pub fn resolve(&self) -> ConfigResult<CrawlConfig> {
        let start = parse_time_arg(&self.start, BoundKind::Start)?;
        let end = parse_time_arg(&self.end, BoundKind::End)?;

        Ok(CrawlConfig {
            group: self.group.trim().to_string(),
            cookie: self.cookie.trim().to_string(),
            window: TimeWindow::new(start, end),
            media: self.media,
            attachments: self.attachments,
            output: PathBuf::from(&self.output),
        })
    }
}

fn default_output() -> String {
    "./output".to_string()
}
