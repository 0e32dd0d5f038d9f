//! Cursor walker over the topic timeline
//!
//! One page job fetches up to a page of topics below its cursor, filters them
//! against the time window, deduplicates, persists the accepted topics and
//! enqueues their media and attachments. The follow-up job carries the next
//! cursor, so pagination stays strictly sequential.

use crate::crawler::fetcher::{ApiClient, PageFetch};
use crate::crawler::parser::{AttachmentRef, MediaRef, Topic};
use crate::crawler::scheduler::TaskQueue;
use crate::output::{Category, DocumentWriter, ProgressSink, Severity};
use crate::state::{ConflictResolver, RunState};
use crate::timeline::{next_cursor, parse_api_timestamp, TimeWindow, WindowPosition};
use crate::TimestampError;
use std::sync::Arc;
use std::time::Duration;

/// A request for one page below `cursor` (`None` = newest page)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    pub cursor: Option<String>,
}

impl PageJob {
    pub fn new(cursor: Option<String>) -> Self {
        Self { cursor }
    }

    fn describe(&self) -> &str {
        self.cursor.as_deref().unwrap_or("<newest>")
    }
}

/// What a page job decided about the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Continue below this cursor
    Next(String),
    /// A topic older than the start bound was seen
    BoundaryReached,
    /// The API returned an empty page: history fully consumed
    Exhausted,
    /// The duplicate handler asked to stop
    Aborted,
    /// Fetch failed; retry the same cursor after the delay
    Retry { delay: Duration },
    /// Cancellation was observed
    Cancelled,
}

/// Pure classification of one page against the window
#[derive(Debug)]
pub struct PageScan<'a> {
    /// In-range topics, in page order
    pub candidates: Vec<&'a Topic>,
    /// Whether a topic older than the start bound ended the scan
    pub boundary_reached: bool,
    /// Cursor for the next page; `None` once the boundary is reached
    pub next_cursor: Option<String>,
}

/// Scans a newest-first page of topics
///
/// Topics newer than the end bound are skipped; the first topic older than
/// the start bound stops the scan. Every timestamp on the page must be in the
/// API form; one that is not fails the whole page before anything is written,
/// since a string comparison against it would misplace it in the window.
pub fn scan_page<'a>(topics: &'a [Topic], window: &TimeWindow) -> Result<PageScan<'a>, TimestampError> {
    for topic in topics {
        parse_api_timestamp(&topic.create_time)?;
    }

    let mut candidates = Vec::new();
    let mut boundary_reached = false;

    for topic in topics {
        match window.classify(&topic.create_time) {
            WindowPosition::BeforeStart => {
                boundary_reached = true;
                break;
            }
            WindowPosition::AfterEnd => continue,
            WindowPosition::InRange => candidates.push(topic),
        }
    }

    let next_cursor = match (boundary_reached, topics.last()) {
        (false, Some(last)) => Some(next_cursor(&last.create_time)?),
        _ => None,
    };

    Ok(PageScan {
        candidates,
        boundary_reached,
        next_cursor,
    })
}

/// Walks the timeline one page job at a time
pub struct Walker {
    client: ApiClient,
    window: TimeWindow,
    state: Arc<RunState>,
    documents: Arc<DocumentWriter>,
    resolver: Arc<dyn ConflictResolver>,
    progress: Arc<dyn ProgressSink>,
    pages: Arc<TaskQueue<PageJob>>,
    media: Option<Arc<TaskQueue<MediaRef>>>,
    attachments: Option<Arc<TaskQueue<AttachmentRef>>>,
    retry_delay: Duration,
    failure_delay: Duration,
}

impl Walker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: ApiClient,
        window: TimeWindow,
        state: Arc<RunState>,
        documents: Arc<DocumentWriter>,
        resolver: Arc<dyn ConflictResolver>,
        progress: Arc<dyn ProgressSink>,
        pages: Arc<TaskQueue<PageJob>>,
        retry_delay: Duration,
        failure_delay: Duration,
    ) -> Self {
        Self {
            client,
            window,
            state,
            documents,
            resolver,
            progress,
            pages,
            media: None,
            attachments: None,
            retry_delay,
            failure_delay,
        }
    }

    /// Enqueues embedded images onto this queue
    pub fn with_media_queue(mut self, queue: Arc<TaskQueue<MediaRef>>) -> Self {
        self.media = Some(queue);
        self
    }

    /// Enqueues file attachments onto this queue
    pub fn with_attachment_queue(mut self, queue: Arc<TaskQueue<AttachmentRef>>) -> Self {
        self.attachments = Some(queue);
        self
    }

    /// Runs one page job and schedules whatever follows it
    pub async fn run_page(self: Arc<Self>, job: PageJob) {
        match self.walk_page(job.cursor.as_deref()).await {
            PageOutcome::Next(cursor) => {
                tracing::debug!("Next cursor {}", cursor);
                self.pages.push(PageJob::new(Some(cursor)));
            }
            PageOutcome::BoundaryReached => {
                self.progress
                    .log(Severity::Info, "Reached the start of the time window");
            }
            PageOutcome::Exhausted => {
                self.progress
                    .log(Severity::Info, "Reached the beginning of the group history");
            }
            PageOutcome::Aborted => {
                self.progress
                    .log(Severity::Warn, "Walk stopped after a duplicate topic");
            }
            PageOutcome::Cancelled => {
                tracing::debug!("Page job at cursor {} dropped after cancellation", job.describe());
            }
            PageOutcome::Retry { delay } => {
                tracing::info!("Retrying cursor {} in {:?}", job.describe(), delay);
                let cancel = self.state.cancel_token().clone();
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Retry of cursor {} dropped after cancellation", job.describe());
                    }
                    _ = tokio::time::sleep(delay) => {
                        self.pages.push(job);
                    }
                }
            }
        }
    }

    /// Fetches and processes the page below `cursor`
    pub async fn walk_page(&self, cursor: Option<&str>) -> PageOutcome {
        if self.state.is_cancelled() {
            return PageOutcome::Cancelled;
        }
        let at = cursor.unwrap_or("<newest>");

        match self.client.fetch_topics(cursor).await {
            PageFetch::Page(topics) => self.process_page(at, &topics).await,
            PageFetch::Rejected { detail } => {
                self.progress.log(
                    Severity::Warn,
                    &format!("API rejected page at cursor {}: {}", at, detail),
                );
                PageOutcome::Retry {
                    delay: self.failure_delay,
                }
            }
            PageFetch::Malformed { error } => {
                self.progress.log(
                    Severity::Warn,
                    &format!("Malformed page at cursor {}: {}", at, error),
                );
                PageOutcome::Retry {
                    delay: self.retry_delay,
                }
            }
            PageFetch::NetworkError { error } => {
                self.progress.log(
                    Severity::Warn,
                    &format!("Network error at cursor {}: {}", at, error),
                );
                PageOutcome::Retry {
                    delay: self.retry_delay,
                }
            }
        }
    }

    async fn process_page(&self, at: &str, topics: &[Topic]) -> PageOutcome {
        if topics.is_empty() {
            return PageOutcome::Exhausted;
        }

        let scan = match scan_page(topics, &self.window) {
            Ok(scan) => scan,
            Err(e) => {
                self.progress.log(
                    Severity::Warn,
                    &format!("Malformed page at cursor {}: {}", at, e),
                );
                return PageOutcome::Retry {
                    delay: self.retry_delay,
                };
            }
        };

        tracing::info!(
            "Page at cursor {}: {} topics, {} in window",
            at,
            topics.len(),
            scan.candidates.len()
        );

        for topic in scan.candidates {
            if self.state.is_cancelled() {
                return PageOutcome::Cancelled;
            }

            if !self.state.seen.insert(&topic.create_time) {
                if self.resolver.on_duplicate(&topic.create_time).await {
                    tracing::warn!(
                        "Duplicate create_time {} (topic {}): stopping walk",
                        topic.create_time,
                        topic.topic_id
                    );
                    return PageOutcome::Aborted;
                }
                tracing::debug!(
                    "Skipping duplicate create_time {} (topic {})",
                    topic.create_time,
                    topic.topic_id
                );
                continue;
            }

            self.accept(topic).await;
        }

        match scan.next_cursor {
            Some(cursor) => PageOutcome::Next(cursor),
            None => PageOutcome::BoundaryReached,
        }
    }

    /// Persists one topic and enqueues its downloads
    async fn accept(&self, topic: &Topic) {
        match self.documents.write_topic(topic).await {
            Ok(path) => {
                tracing::debug!("Topic {} written to {}", topic.topic_id, path.display());
                let count = self.state.counters.increment(Category::Records);
                self.progress.progress(Category::Records, count);
            }
            Err(e) => {
                self.progress.log(
                    Severity::Error,
                    &format!("Failed to save topic {} ({}): {}", topic.topic_id, topic.create_time, e),
                );
                return;
            }
        }

        if let Some(queue) = &self.media {
            for media in topic.media_refs() {
                queue.push(media);
            }
        }
        if let Some(queue) = &self.attachments {
            for attachment in topic.attachment_refs() {
                queue.push(attachment);
            }
        }
    }
}
