//! zsxq-harvest: an archiver for knowledge-community topic history
//!
//! This crate walks a group's topic timeline through the paginated REST API,
//! appends every topic inside the configured time window to monthly markdown
//! documents, and optionally downloads the images and files those topics
//! reference.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod timeline;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unsupported time format: {0}")]
    InvalidTime(String),
}

/// Errors raised while reading or shifting API timestamps
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("Timestamp '{0}' does not match YYYY-MM-DDTHH:MM:SS.mmm+HHMM")]
    Format(String),

    #[error("Timestamp '{0}' is out of range")]
    OutOfRange(String),
}

/// Errors raised by a single API or download request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("API rejected request to {url}: {detail}")]
    Rejected { url: String, detail: String },
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for timestamp operations
pub type TimestampResult<T> = std::result::Result<T, TimestampError>;

// Re-export commonly used types
pub use config::{Config, CrawlConfig};
pub use crawler::{Crawler, RunOutcome};
pub use state::{ConflictResolver, PolicyResolver};
pub use timeline::TimeWindow;
