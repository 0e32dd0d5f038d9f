//! Output sink traits and types
//!
//! This module defines the seams through which the crawl pipeline writes
//! documents and binaries, and through which it reports progress.

use crate::crawler::RunOutcome;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only store of rendered topic documents
///
/// Implementations must be thread-safe.
pub trait DocumentSink: Send + Sync {
    /// Path of the document holding topics of the given month (`YYYY-MM`)
    fn document_path(&self, month_key: &str) -> PathBuf;

    /// Whether the document already exists
    fn exists(&self, path: &Path) -> bool;

    /// Empties the document, creating it when missing
    fn truncate(&self, path: &Path) -> OutputResult<()>;

    /// Appends a rendered block to the document
    fn append(&self, path: &Path, block: &str) -> OutputResult<()>;
}

/// Store for downloaded media and attachments
pub trait BinarySink: Send + Sync {
    /// Absolute destination for a path relative to the output root
    fn destination(&self, relative: &str) -> PathBuf;

    /// Writes the bytes, creating parent directories as needed
    fn write(&self, path: &Path, bytes: &[u8]) -> OutputResult<()>;
}

/// Counter categories reported while a run progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Records,
    Media,
    Attachments,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Records => "records",
            Self::Media => "media",
            Self::Attachments => "attachments",
        }
    }
}

/// Severity tag of an operator-facing log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Receives progress updates and log lines from any worker
///
/// Implementations must be safe to call from every worker concurrently.
pub trait ProgressSink: Send + Sync {
    /// A counter advanced to `count`
    fn progress(&self, category: Category, count: u64);

    /// A free-text log line
    fn log(&self, severity: Severity, message: &str);

    /// The run finished; called exactly once
    fn finished(&self, _outcome: &RunOutcome) {}
}
