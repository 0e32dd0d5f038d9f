//! Monthly topic documents on the filesystem
//!
//! [`FsDocumentSink`] stores one markdown file per month under
//! `<output>/topics/`. [`DocumentWriter`] layers the per-run conflict handling
//! on top: the first time a run touches a document that already exists, the
//! conflict resolver decides whether to truncate it or append to it, and that
//! decision is remembered for the rest of the run.

use crate::crawler::Topic;
use crate::output::markdown::render_topic;
use crate::output::traits::{DocumentSink, OutputError, OutputResult};
use crate::state::ConflictResolver;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Filesystem-backed document sink
#[derive(Debug, Clone)]
pub struct FsDocumentSink {
    topics_dir: PathBuf,
}

impl FsDocumentSink {
    /// Creates a sink writing below `<output_root>/topics`
    pub fn new(output_root: &Path) -> Self {
        Self {
            topics_dir: output_root.join("topics"),
        }
    }

    fn ensure_dir(&self) -> OutputResult<()> {
        fs::create_dir_all(&self.topics_dir).map_err(|source| OutputError::CreateDir {
            path: self.topics_dir.clone(),
            source,
        })
    }
}

impl DocumentSink for FsDocumentSink {
    fn document_path(&self, month_key: &str) -> PathBuf {
        self.topics_dir.join(format!("{}.md", month_key))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn truncate(&self, path: &Path) -> OutputResult<()> {
        self.ensure_dir()?;
        fs::File::create(path).map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn append(&self, path: &Path, block: &str) -> OutputResult<()> {
        self.ensure_dir()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| OutputError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        file.write_all(block.as_bytes())
            .map_err(|source| OutputError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// How a run first touched a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentDecision {
    /// The document did not exist yet
    Fresh,
    /// The document existed and was emptied
    Truncated,
    /// The document existed and new topics go after its content
    Appended,
}

/// Writes topics to their monthly documents, settling conflicts once per path
pub struct DocumentWriter {
    sink: Arc<dyn DocumentSink>,
    resolver: Arc<dyn ConflictResolver>,
    decisions: Mutex<HashMap<PathBuf, DocumentDecision>>,
}

impl DocumentWriter {
    pub fn new(sink: Arc<dyn DocumentSink>, resolver: Arc<dyn ConflictResolver>) -> Self {
        Self {
            sink,
            resolver,
            decisions: Mutex::new(HashMap::new()),
        }
    }

    /// Renders and appends a topic, returning the document path
    ///
    /// The decision lock is held across the resolver call, so a second topic
    /// bound for the same document waits for the first decision instead of
    /// prompting again. The decision is recorded even when truncating fails;
    /// later topics then append without asking a second time.
    pub async fn write_topic(&self, topic: &Topic) -> OutputResult<PathBuf> {
        let path = self.sink.document_path(topic.month_key());
        let mut decisions = self.decisions.lock().await;

        if !decisions.contains_key(&path) {
            let decision = if !self.sink.exists(&path) {
                DocumentDecision::Fresh
            } else if self.resolver.on_existing_document(&path).await {
                DocumentDecision::Truncated
            } else {
                DocumentDecision::Appended
            };
            tracing::debug!("Document {} first touched: {:?}", path.display(), decision);
            decisions.insert(path.clone(), decision);

            if decision == DocumentDecision::Truncated {
                self.sink.truncate(&path)?;
            }
        }

        self.sink.append(&path, &render_topic(topic))?;
        Ok(path)
    }

    /// Decision recorded for a document, if the run touched it
    pub async fn decision(&self, path: &Path) -> Option<DocumentDecision> {
        self.decisions.lock().await.get(path).copied()
    }
}
