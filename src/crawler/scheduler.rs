//! Task queues and worker loops
//!
//! This module handles:
//! - Unbounded FIFO queues for page, media and attachment jobs
//! - An outstanding-job counter per queue backing a drain barrier (`join`)
//! - Worker loops that poll with a timeout and observe cancellation
//! - Retiring every claimed job, whether it ran, failed, panicked or was skipped

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

/// Unbounded FIFO of jobs with a completion barrier
///
/// Every pushed job counts as outstanding until it is retired. Popping a job
/// hands out a [`JobGuard`] that retires it on drop, so the barrier in
/// [`TaskQueue::join`] cannot be held up by a job that errored or panicked.
pub struct TaskQueue<T> {
    name: &'static str,
    pending: Mutex<Pending<T>>,
    available: Notify,
    outstanding: watch::Sender<usize>,
}

struct Pending<T> {
    jobs: VecDeque<T>,
    closed: bool,
}

/// Retires one claimed job when dropped
pub struct JobGuard<T> {
    queue: Arc<TaskQueue<T>>,
}

impl<T> Drop for JobGuard<T> {
    fn drop(&mut self) {
        self.queue.retire();
    }
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue
    pub fn new(name: &'static str) -> Arc<Self> {
        let (outstanding, _) = watch::channel(0);
        Arc::new(Self {
            name,
            pending: Mutex::new(Pending {
                jobs: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
            outstanding,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, Pending<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a job; returns false if the queue was closed
    pub fn push(&self, job: T) -> bool {
        let mut pending = self.lock();
        if pending.closed {
            tracing::debug!("Queue {} closed, dropping job", self.name);
            return false;
        }
        pending.jobs.push_back(job);
        // counted under the lock so join never observes a pushed-but-uncounted job
        self.outstanding.send_modify(|count| *count += 1);
        drop(pending);

        self.available.notify_one();
        true
    }

    /// Claims the next job, waiting up to `timeout` for one to arrive
    pub async fn poll(self: &Arc<Self>, timeout: Duration) -> Option<(T, JobGuard<T>)> {
        if let Some(claimed) = self.try_pop() {
            return Some(claimed);
        }
        let _ = tokio::time::timeout(timeout, self.available.notified()).await;
        self.try_pop()
    }

    fn try_pop(self: &Arc<Self>) -> Option<(T, JobGuard<T>)> {
        let job = self.lock().jobs.pop_front()?;
        Some((
            job,
            JobGuard {
                queue: Arc::clone(self),
            },
        ))
    }

    fn retire(&self) {
        self.outstanding
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Closes the queue: pending jobs are retired unexecuted and later pushes are refused
    ///
    /// Returns how many pending jobs were discarded.
    pub fn close(&self) -> usize {
        let mut pending = self.lock();
        pending.closed = true;
        let discarded = pending.jobs.len();
        pending.jobs.clear();
        if discarded > 0 {
            self.outstanding
                .send_modify(|count| *count = count.saturating_sub(discarded));
        }
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Jobs waiting to be claimed
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Jobs pushed but not yet retired (pending plus in flight)
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Waits until every pushed job has been retired
    pub async fn join(&self) {
        let mut outstanding = self.outstanding.subscribe();
        // the sender lives in self, so the channel cannot close while we wait
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }
}

/// Signals every worker loop watches
#[derive(Debug, Clone)]
pub struct WorkerSignals {
    /// Operator stop: pending jobs are discarded
    pub cancel: CancellationToken,
    /// Normal end of the run after all queues drained
    pub shutdown: CancellationToken,
    /// Longest wait on an empty queue before re-checking the signals
    pub poll_interval: Duration,
}

/// Runs a worker loop over a queue until cancellation or shutdown
///
/// Each job body runs in its own task: a panic is logged and the worker moves
/// on. The job is retired after its body finishes, whatever the outcome.
/// Once cancellation is observed the queue is closed, which retires every
/// pending job without running it.
pub async fn run_worker<T, F, Fut>(
    worker: String,
    queue: Arc<TaskQueue<T>>,
    signals: WorkerSignals,
    handler: F,
) where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    tracing::debug!("Worker {} started on queue {}", worker, queue.name());

    loop {
        if signals.cancel.is_cancelled() {
            let discarded = queue.close();
            if discarded > 0 {
                tracing::debug!(
                    "Worker {} discarded {} pending jobs after cancellation",
                    worker,
                    discarded
                );
            }
            break;
        }
        if signals.shutdown.is_cancelled() {
            queue.close();
            break;
        }

        let claimed = tokio::select! {
            biased;
            _ = signals.cancel.cancelled() => continue,
            _ = signals.shutdown.cancelled() => continue,
            claimed = queue.poll(signals.poll_interval) => claimed,
        };
        let Some((job, guard)) = claimed else {
            continue;
        };

        if signals.cancel.is_cancelled() {
            // claimed but never started
            drop(guard);
            continue;
        }

        if let Err(e) = tokio::spawn(handler(job)).await {
            tracing::error!("Worker {} job failed: {}", worker, e);
        }
        drop(guard);
    }

    tracing::debug!("Worker {} stopped", worker);
}
