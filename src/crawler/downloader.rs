//! Media and attachment downloads
//!
//! Each candidate URL is tried a fixed number of times before the next one
//! is tried. A unit that cannot be fetched or saved is logged and abandoned;
//! it never fails the run.

use crate::crawler::fetcher::ApiClient;
use crate::crawler::parser::{AttachmentRef, MediaRef};
use crate::output::{BinarySink, Category, ProgressSink, Severity};
use crate::state::RunState;
use crate::FetchError;
use std::sync::Arc;
use std::time::Duration;

/// Downloads binaries and hands them to the binary sink
pub struct Downloader {
    client: ApiClient,
    sink: Arc<dyn BinarySink>,
    state: Arc<RunState>,
    progress: Arc<dyn ProgressSink>,
    attempts: u32,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(
        client: ApiClient,
        sink: Arc<dyn BinarySink>,
        state: Arc<RunState>,
        progress: Arc<dyn ProgressSink>,
        attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            sink,
            state,
            progress,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// Downloads one image, preferring the highest-fidelity source
    pub async fn download_media(self: Arc<Self>, media: MediaRef) {
        let label = format!("image {}", media.id);
        if media.candidates.is_empty() {
            self.progress
                .log(Severity::Warn, &format!("{} has no source URL", label));
            return;
        }

        if let Some(bytes) = self.fetch_first(&media.candidates, &label).await {
            self.save(Category::Media, &media.relative_path(), &bytes, &label);
        }
    }

    /// Resolves and downloads one file attachment
    pub async fn download_attachment(self: Arc<Self>, attachment: AttachmentRef) {
        let label = format!("file {} ({})", attachment.id, attachment.name);
        let Some(url) = self.resolve(attachment.id, &label).await else {
            return;
        };

        if let Some(bytes) = self.fetch_first(std::slice::from_ref(&url), &label).await {
            self.save(Category::Attachments, &attachment.relative_path(), &bytes, &label);
        }
    }

    /// Asks the API where an attachment can be downloaded from
    async fn resolve(&self, file_id: u64, label: &str) -> Option<String> {
        for attempt in 1..=self.attempts {
            if self.state.is_cancelled() {
                return None;
            }

            match self.client.resolve_download_url(file_id).await {
                Ok(url) => return Some(url),
                Err(e @ (FetchError::Rejected { .. } | FetchError::Malformed { .. })) => {
                    self.progress.log(
                        Severity::Error,
                        &format!("Cannot resolve download URL of {}: {}", label, e),
                    );
                    return None;
                }
                Err(e) => {
                    tracing::warn!(
                        "Resolving {} failed (attempt {}/{}): {}",
                        label,
                        attempt,
                        self.attempts,
                        e
                    );
                    if attempt < self.attempts && !self.backoff().await {
                        return None;
                    }
                }
            }
        }

        self.progress.log(
            Severity::Error,
            &format!("Giving up on {}: download URL never resolved", label),
        );
        None
    }

    /// Returns the body of the first candidate that downloads
    async fn fetch_first(&self, candidates: &[String], label: &str) -> Option<Vec<u8>> {
        for url in candidates {
            for attempt in 1..=self.attempts {
                if self.state.is_cancelled() {
                    return None;
                }

                match self.client.download(url).await {
                    Ok(bytes) => return Some(bytes),
                    Err(e) => {
                        tracing::warn!(
                            "Downloading {} failed (attempt {}/{}): {}",
                            label,
                            attempt,
                            self.attempts,
                            e
                        );
                        if attempt < self.attempts && !self.backoff().await {
                            return None;
                        }
                    }
                }
            }
        }

        self.progress.log(
            Severity::Error,
            &format!("Giving up on {}: every source failed", label),
        );
        None
    }

    fn save(&self, category: Category, relative: &str, bytes: &[u8], label: &str) {
        let path = self.sink.destination(relative);
        match self.sink.write(&path, bytes) {
            Ok(()) => {
                tracing::debug!("Saved {} to {}", label, path.display());
                let count = self.state.counters.increment(category);
                self.progress.progress(category, count);
            }
            Err(e) => {
                self.progress
                    .log(Severity::Error, &format!("Failed to save {}: {}", label, e));
            }
        }
    }

    /// Sleeps before a retry; false if cancellation interrupted the wait
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.state.cancel_token().cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }
}
