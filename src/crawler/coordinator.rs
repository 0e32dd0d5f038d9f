//! Crawler coordinator - run orchestration
//!
//! This module wires one harvest run together:
//! - Creating the output root and the API client
//! - Creating the record, media and attachment queues and their workers
//! - Seeding the record queue with the initial cursor
//! - Waiting for the queues to drain in order: records, media, attachments
//! - Reporting the run result

use crate::config::{CrawlConfig, CrawlerSettings};
use crate::crawler::downloader::Downloader;
use crate::crawler::fetcher::ApiClient;
use crate::crawler::parser::{AttachmentRef, MediaRef};
use crate::crawler::scheduler::{run_worker, TaskQueue, WorkerSignals};
use crate::crawler::walker::{PageJob, Walker};
use crate::output::stats::format_counters;
use crate::output::{
    DocumentWriter, FsBinarySink, FsDocumentSink, OutputError, ProgressSink, TracingProgress,
};
use crate::state::{ConflictResolver, CounterSnapshot, PolicyResolver, RunState};
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub counters: CounterSnapshot,
}

impl RunOutcome {
    /// The walk ended on its own and every queue drained
    pub fn completed(counters: CounterSnapshot) -> Self {
        Self {
            success: true,
            message: format!("finished: {}", format_counters(&counters)),
            counters,
        }
    }

    /// The run was cancelled
    pub fn stopped(counters: CounterSnapshot) -> Self {
        Self {
            success: false,
            message: "stopped".to_string(),
            counters,
        }
    }

    /// The run could not be set up or a worker failed
    pub fn failed(error: &HarvestError, counters: CounterSnapshot) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            counters,
        }
    }
}

/// One harvest run
pub struct Crawler {
    config: CrawlConfig,
    settings: CrawlerSettings,
    resolver: Arc<dyn ConflictResolver>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Crawler {
    /// Creates a run that skips duplicates, appends to existing documents and logs through `tracing`
    pub fn new(config: CrawlConfig, settings: CrawlerSettings) -> Self {
        Self {
            config,
            settings,
            resolver: Arc::new(PolicyResolver::new(false, false)),
            progress: Arc::new(TracingProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests a cooperative stop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Runs to completion and reports the outcome to the progress sink
    pub async fn run(self) -> RunOutcome {
        let state = Arc::new(RunState::new(self.cancel.clone()));

        let outcome = match self.execute(&state).await {
            Ok(()) if state.is_cancelled() => RunOutcome::stopped(state.counters.snapshot()),
            Ok(()) => RunOutcome::completed(state.counters.snapshot()),
            Err(e) => {
                tracing::error!("Harvest failed: {}", e);
                RunOutcome::failed(&e, state.counters.snapshot())
            }
        };

        self.progress.finished(&outcome);
        outcome
    }

    async fn execute(&self, state: &Arc<RunState>) -> Result<(), HarvestError> {
        let config = &self.config;
        let settings = &self.settings;

        tracing::info!(
            "Harvesting group {} from {} to {} into {}",
            config.group,
            config.window.start.as_deref().unwrap_or("<beginning>"),
            config.window.end.as_deref().unwrap_or("<now>"),
            config.output.display()
        );

        std::fs::create_dir_all(&config.output).map_err(|source| OutputError::CreateDir {
            path: config.output.clone(),
            source,
        })?;

        let client = ApiClient::new(config, settings)?;
        let initial_cursor = config.window.initial_cursor()?;

        let shutdown = self.cancel.child_token();
        let signals = WorkerSignals {
            cancel: self.cancel.clone(),
            shutdown: shutdown.clone(),
            poll_interval: settings.poll_interval(),
        };

        let pages: Arc<TaskQueue<PageJob>> = TaskQueue::new("records");
        let media: Option<Arc<TaskQueue<MediaRef>>> =
            config.media.then(|| TaskQueue::new("media"));
        let attachments: Option<Arc<TaskQueue<AttachmentRef>>> =
            config.attachments.then(|| TaskQueue::new("attachments"));
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let downloader = Arc::new(Downloader::new(
            client.clone(),
            Arc::new(FsBinarySink::new(&config.output)),
            state.clone(),
            self.progress.clone(),
            settings.download_attempts,
            settings.retry_delay(),
        ));

        if let Some(queue) = &media {
            for i in 0..settings.media_workers {
                let downloader = downloader.clone();
                handles.push(tokio::spawn(run_worker(
                    format!("media-{}", i),
                    queue.clone(),
                    signals.clone(),
                    move |job| downloader.clone().download_media(job),
                )));
            }
        }

        if let Some(queue) = &attachments {
            let downloader = downloader.clone();
            handles.push(tokio::spawn(run_worker(
                "attachments-0".to_string(),
                queue.clone(),
                signals.clone(),
                move |job| downloader.clone().download_attachment(job),
            )));
        }

        let documents = Arc::new(DocumentWriter::new(
            Arc::new(FsDocumentSink::new(&config.output)),
            self.resolver.clone(),
        ));
        let mut walker = Walker::new(
            client,
            config.window.clone(),
            state.clone(),
            documents,
            self.resolver.clone(),
            self.progress.clone(),
            pages.clone(),
            settings.retry_delay(),
            settings.failure_delay(),
        );
        if let Some(queue) = &media {
            walker = walker.with_media_queue(queue.clone());
        }
        if let Some(queue) = &attachments {
            walker = walker.with_attachment_queue(queue.clone());
        }
        let walker = Arc::new(walker);
        handles.push(tokio::spawn(run_worker(
            "records-0".to_string(),
            pages.clone(),
            signals.clone(),
            move |job| walker.clone().run_page(job),
        )));

        pages.push(PageJob::new(initial_cursor));

        pages.join().await;
        tracing::info!("Record queue drained");
        if let Some(queue) = &media {
            queue.join().await;
            tracing::info!("Media queue drained");
        }
        if let Some(queue) = &attachments {
            queue.join().await;
            tracing::info!("Attachment queue drained");
        }

        shutdown.cancel();
        for handle in handles {
            handle
                .await
                .map_err(|e| HarvestError::Worker(e.to_string()))?;
        }

        Ok(())
    }
}
