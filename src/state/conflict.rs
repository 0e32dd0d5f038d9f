//! Pluggable conflict decisions
//!
//! Two situations need a decision the crawler cannot make on its own:
//! - the same creation time shows up twice within a run
//! - a monthly document already exists on disk the first time the run writes to it
//!
//! The worker hitting either situation awaits the resolver before it
//! continues. The answer itself may come from anywhere (a fixed policy, the
//! terminal, a UI thread).

use crate::config::{ConflictSettings, DuplicatePolicy, ExistingDocumentPolicy};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::path::Path;
use tokio::sync::Mutex;

/// Decision point for data anomalies and file collisions
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// A creation time was seen twice; `true` stops the walk, `false` skips the record
    async fn on_duplicate(&self, create_time: &str) -> bool;

    /// A document exists before this run wrote to it; `true` truncates, `false` appends
    async fn on_existing_document(&self, path: &Path) -> bool;
}

/// Resolver answering from fixed policies
#[derive(Debug, Clone, Copy)]
pub struct PolicyResolver {
    abort_on_duplicate: bool,
    truncate_existing: bool,
}

impl PolicyResolver {
    pub fn new(abort_on_duplicate: bool, truncate_existing: bool) -> Self {
        Self {
            abort_on_duplicate,
            truncate_existing,
        }
    }

    /// Builds a resolver from config; `prompt` policies fall back to skip/append
    pub fn from_settings(settings: &ConflictSettings) -> Self {
        Self::new(
            settings.on_duplicate == DuplicatePolicy::Abort,
            settings.on_existing_document == ExistingDocumentPolicy::Truncate,
        )
    }
}

#[async_trait]
impl ConflictResolver for PolicyResolver {
    async fn on_duplicate(&self, create_time: &str) -> bool {
        tracing::warn!(
            "Duplicate create_time {}: {}",
            create_time,
            if self.abort_on_duplicate {
                "stopping walk"
            } else {
                "skipping"
            }
        );
        self.abort_on_duplicate
    }

    async fn on_existing_document(&self, path: &Path) -> bool {
        tracing::info!(
            "Document {} exists: {}",
            path.display(),
            if self.truncate_existing {
                "truncating"
            } else {
                "appending"
            }
        );
        self.truncate_existing
    }
}

/// Resolver asking the operator on the terminal
///
/// Policies other than `prompt` in the settings are answered without asking.
/// Questions are serialized so two workers never interleave their prompts.
pub struct PromptResolver {
    fallback: PolicyResolver,
    ask_duplicate: bool,
    ask_existing: bool,
    turn: Mutex<()>,
}

impl PromptResolver {
    pub fn new(settings: &ConflictSettings) -> Self {
        Self {
            fallback: PolicyResolver::from_settings(settings),
            ask_duplicate: settings.on_duplicate == DuplicatePolicy::Prompt,
            ask_existing: settings.on_existing_document == ExistingDocumentPolicy::Prompt,
            turn: Mutex::new(()),
        }
    }

    /// Asks a yes/no question; `None` if stdin could not be read
    async fn ask(&self, question: String) -> Option<bool> {
        let _turn = self.turn.lock().await;
        tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            write!(stderr, "{} [y/N] ", question).ok()?;
            stderr.flush().ok()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).ok()?;
            Some(parse_answer(&line))
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl ConflictResolver for PromptResolver {
    async fn on_duplicate(&self, create_time: &str) -> bool {
        if !self.ask_duplicate {
            return self.fallback.on_duplicate(create_time).await;
        }
        let question = format!(
            "Duplicate create_time detected: {}\nStop the harvest? (no skips this topic and continues)",
            create_time
        );
        match self.ask(question).await {
            Some(answer) => answer,
            None => self.fallback.on_duplicate(create_time).await,
        }
    }

    async fn on_existing_document(&self, path: &Path) -> bool {
        if !self.ask_existing {
            return self.fallback.on_existing_document(path).await;
        }
        let question = format!(
            "Output document already exists: {}\nOverwrite it? (no appends to it)",
            path.display()
        );
        match self.ask(question).await {
            Some(answer) => answer,
            None => self.fallback.on_existing_document(path).await,
        }
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
