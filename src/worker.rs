//! Worker pool -- symmetric workers pulling items from the dispatch queue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{AggregatedError, CancellationCause, Error, ItemError, Result};
use crate::lifetime::RunLifetime;
use crate::processor::{ItemProcessor, ProcessError, ProcessMode, ProcessRequest};
use crate::progress::ProgressHandle;
use crate::types::Item;

/// Receiving end of the dispatch queue, shared by every worker
type SharedQueue = Arc<Mutex<mpsc::Receiver<Item>>>;

/// What one worker did before it returned
#[derive(Debug, Default)]
pub struct WorkerReport {
    /// Worker index
    pub id: usize,
    /// Items picked up (successful or not)
    pub processed: u64,
    /// Items that failed
    pub failures: AggregatedError,
    /// Set when the worker stopped because the run was cancelled
    pub cancelled: Option<CancellationCause>,
}

/// Merged result of every worker
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Items picked up across all workers
    pub processed: u64,
    /// Every item failure from every worker
    pub failures: AggregatedError,
    /// First cancellation cause any worker observed
    pub cancelled: Option<CancellationCause>,
}

impl PoolReport {
    fn absorb(&mut self, report: WorkerReport) {
        self.processed += report.processed;
        self.failures.merge(report.failures);
        if self.cancelled.is_none() {
            self.cancelled = report.cancelled;
        }
    }
}

/// Fixed-size pool of workers sharing one processor
pub struct WorkerPool<P: ItemProcessor + ?Sized> {
    workers: usize,
    processor: Arc<P>,
    directory: PathBuf,
    extra_args: Arc<Vec<String>>,
}

impl<P: ItemProcessor + ?Sized + 'static> WorkerPool<P> {
    /// Create a pool of `workers` workers writing below `directory`
    pub fn new(
        workers: usize,
        processor: Arc<P>,
        directory: PathBuf,
        extra_args: Vec<String>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            processor,
            directory,
            extra_args: Arc::new(extra_args),
        }
    }

    /// Spawn every worker on `rx`
    ///
    /// Workers return when the queue is closed and drained, or when the
    /// lifetime is cancelled.
    pub fn spawn(
        self,
        rx: mpsc::Receiver<Item>,
        progress: ProgressHandle,
        lifetime: RunLifetime,
    ) -> Vec<JoinHandle<WorkerReport>> {
        let queue: SharedQueue = Arc::new(Mutex::new(rx));

        tracing::debug!(
            workers = self.workers,
            processor = self.processor.name(),
            "starting worker pool"
        );

        (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    processor: Arc::clone(&self.processor),
                    directory: self.directory.clone(),
                    extra_args: Arc::clone(&self.extra_args),
                    progress: progress.clone(),
                    lifetime: lifetime.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }
}

/// Join every worker and merge their reports
///
/// A worker that panicked is reported as [`Error::TaskFailed`] after the
/// remaining workers have been joined.
pub async fn join_workers(handles: Vec<JoinHandle<WorkerReport>>) -> Result<PoolReport> {
    let mut pool = PoolReport::default();
    let mut panicked = None;

    for result in futures::future::join_all(handles).await {
        match result {
            Ok(report) => pool.absorb(report),
            Err(e) => {
                tracing::error!(error = %e, "worker task failed");
                panicked.get_or_insert_with(|| e.to_string());
            }
        }
    }

    match panicked {
        Some(message) => Err(Error::TaskFailed(message)),
        None => Ok(pool),
    }
}

struct Worker<P: ItemProcessor + ?Sized> {
    id: usize,
    queue: SharedQueue,
    processor: Arc<P>,
    directory: PathBuf,
    extra_args: Arc<Vec<String>>,
    progress: ProgressHandle,
    lifetime: RunLifetime,
}

impl<P: ItemProcessor + ?Sized> Worker<P> {
    async fn run(self) -> WorkerReport {
        let mut report = WorkerReport {
            id: self.id,
            ..Default::default()
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => None,
                item = async { self.queue.lock().await.recv().await } => item,
            };

            // A dequeued item is dropped unstarted once the run is cancelled.
            let item = match next {
                Some(item) if !self.lifetime.is_cancelled() => item,
                _ => {
                    if self.lifetime.is_cancelled() {
                        report.cancelled = Some(self.lifetime.observed_cause());
                    }
                    break;
                }
            };

            report.processed += 1;
            self.progress.start(&item);
            let outcome = self.process(&item).await;
            self.progress.complete(&item);

            match outcome {
                Ok(()) => {
                    tracing::debug!(worker = self.id, item = %item, "item done");
                }
                Err(ItemOutcome::Failed(failure)) => {
                    tracing::warn!(worker = self.id, item = %item, error = %failure.cause, "item failed");
                    report.failures.push(failure);
                }
                Err(ItemOutcome::Cancelled) => {
                    report.cancelled = Some(self.lifetime.observed_cause());
                    break;
                }
            }
        }

        tracing::debug!(
            worker = self.id,
            processed = report.processed,
            failures = report.failures.len(),
            cancelled = ?report.cancelled,
            "worker finished"
        );
        report
    }

    async fn process(&self, item: &Item) -> std::result::Result<(), ItemOutcome> {
        let target = item.target_path(&self.directory).ok_or_else(|| {
            ItemOutcome::Failed(ItemError::new(
                item.clone(),
                "invalid repository identifier, expected owner/name",
            ))
        })?;

        let request = ProcessRequest {
            item: item.clone(),
            mode: ProcessMode::for_target(&target).await,
            target,
            extra_args: self.extra_args.as_ref().clone(),
        };

        tracing::trace!(worker = self.id, item = %item, mode = ?request.mode, "processing");

        match self.processor.process(&request, self.lifetime.token()).await {
            Ok(()) => Ok(()),
            Err(ProcessError::Failed(cause)) => {
                Err(ItemOutcome::Failed(ItemError::new(item.clone(), cause)))
            }
            Err(ProcessError::Cancelled) => Err(ItemOutcome::Cancelled),
        }
    }
}

enum ItemOutcome {
    Failed(ItemError),
    Cancelled,
}
