use crate::output::Category;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Creation times accepted so far in this run
///
/// Pages are requested newest-first with a strictly decreasing cursor, so a
/// creation time showing up twice means the API repeated itself.
#[derive(Debug, Default)]
pub struct SeenSet {
    seen: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a creation time; returns false if it was already present
    pub fn insert(&self, create_time: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert(create_time.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub records: u64,
    pub media: u64,
    pub attachments: u64,
}

/// Monotonic counters of saved records, media and attachments
#[derive(Debug, Default)]
pub struct RunCounters {
    records: AtomicU64,
    media: AtomicU64,
    attachments: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, category: Category) -> &AtomicU64 {
        match category {
            Category::Records => &self.records,
            Category::Media => &self.media,
            Category::Attachments => &self.attachments,
        }
    }

    /// Advances a counter and returns its new value
    pub fn increment(&self, category: Category) -> u64 {
        self.counter(category).fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self, category: Category) -> u64 {
        self.counter(category).load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            records: self.get(Category::Records),
            media: self.get(Category::Media),
            attachments: self.get(Category::Attachments),
        }
    }
}

/// Shared state of one harvest run
///
/// Handed to every worker behind an `Arc`; nothing here is global.
#[derive(Debug, Default)]
pub struct RunState {
    pub seen: SeenSet,
    pub counters: RunCounters,
    cancel: CancellationToken,
}

impl RunState {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            seen: SeenSet::new(),
            counters: RunCounters::new(),
            cancel,
        }
    }

    /// Requests a cooperative stop of the run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
