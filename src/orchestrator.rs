//! Run orchestration -- wires the source, the worker pool and the progress
//! coordinator under one cancelable lifetime and classifies how the run ended.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::catalog::{Catalog, SearchScope};
use crate::config::Config;
use crate::error::{CancellationCause, Error, Result};
use crate::input;
use crate::lifetime::RunLifetime;
use crate::processor::ItemProcessor;
use crate::progress::{
    CoordinatorExit, CoordinatorReport, ProgressCoordinator, ProgressDisplay, ProgressHandle,
};
use crate::source::{ItemSource, SourceStats};
use crate::types::{RunOutcome, RunReport};
use crate::worker::{PoolReport, WorkerPool, join_workers};

/// What the source and the workers returned once they all unwound
#[derive(Debug)]
struct PipelineResult {
    source: Result<SourceStats>,
    workers: Result<PoolReport>,
}

/// Runs one bulk clone/sync from catalog to exit classification
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use bulk_clone::{Config, GhCliProcessor, GitHubCatalog, HiddenDisplay, Orchestrator};
///
/// # async fn example() -> bulk_clone::Result<()> {
/// let mut config = Config::default();
/// config.owner = "octo-org".to_string();
///
/// let catalog = GitHubCatalog::from_config(&config.catalog, None).await?;
/// let processor = GhCliProcessor::from_config(&config.clone)?;
/// let orchestrator = Orchestrator::new(config, Arc::new(catalog), Arc::new(processor));
///
/// let report = orchestrator.run(Box::new(HiddenDisplay)).await?;
/// std::process::exit(report.outcome.exit_code());
/// # }
/// ```
pub struct Orchestrator<C: Catalog + ?Sized, P: ItemProcessor + ?Sized> {
    config: Config,
    catalog: Arc<C>,
    processor: Arc<P>,
}

impl<C, P> Orchestrator<C, P>
where
    C: Catalog + ?Sized + 'static,
    P: ItemProcessor + ?Sized + 'static,
{
    /// Create an orchestrator
    pub fn new(config: Config, catalog: Arc<C>, processor: Arc<P>) -> Self {
        Self {
            config,
            catalog,
            processor,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run until completion, operator interrupt or deadline
    ///
    /// Interrupts come from SIGINT/SIGTERM.
    pub async fn run(&self, display: Box<dyn ProgressDisplay>) -> Result<RunReport> {
        self.run_with_interrupt(display, input::wait_for_interrupt()).await
    }

    /// Run with a caller-supplied interrupt source
    ///
    /// The first completion of `interrupt` is delivered to the coordinator as
    /// a user interrupt, and aborts the run even after the coordinator has
    /// already reached its total. Returns `Err` for a fatal catalog error or a
    /// failed pipeline task; every other ending is a [`RunOutcome`].
    pub async fn run_with_interrupt<F>(
        &self,
        display: Box<dyn ProgressDisplay>,
        interrupt: F,
    ) -> Result<RunReport>
    where
        F: std::future::Future + Send + 'static,
    {
        let deadline = Instant::now() + self.config.timeout;
        let lifetime = RunLifetime::new();

        tracing::info!(
            owner = %self.config.owner,
            workers = self.config.clone.workers,
            directory = %self.config.clone.directory.display(),
            timeout_secs = self.config.timeout.as_secs(),
            "starting run"
        );

        let (progress, mut coordinator) = ProgressCoordinator::spawn(
            self.config.progress.clone(),
            display,
            lifetime.token().clone(),
        );

        let listeners = lifetime.token().child_token();
        let _listeners_guard = listeners.clone().drop_guard();
        let mut interrupted =
            input::spawn_interrupt_forwarder(interrupt, progress.clone(), listeners);

        let mut pipeline = self.spawn_pipeline(progress, lifetime.clone());

        let report = match tokio::time::timeout_at(deadline, &mut coordinator).await {
            Err(_elapsed) => {
                return self
                    .abandon(&lifetime, CancellationCause::Deadline, coordinator, pipeline)
                    .await;
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "progress coordinator failed");
                lifetime.cancel(CancellationCause::Fatal);
                self.grace(pipeline).await;
                return Err(Error::TaskFailed(format!("progress coordinator: {}", e)));
            }
            Ok(Ok(report)) => report,
        };

        if report.exit == CoordinatorExit::Aborted {
            return Ok(self.abort(&lifetime, pipeline, report).await);
        }

        // The coordinator can finish on a reported total while items are still
        // in flight; an interrupt must still stop them.
        let waited = tokio::select! {
            biased;
            forwarded = &mut interrupted => {
                if matches!(forwarded, Ok(true)) {
                    return Ok(self.abort(&lifetime, pipeline, report).await);
                }
                tokio::time::timeout_at(deadline, &mut pipeline).await
            }
            waited = tokio::time::timeout_at(deadline, &mut pipeline) => waited,
        };

        let result = match waited {
            Err(_elapsed) => {
                lifetime.cancel(CancellationCause::Deadline);
                self.grace(pipeline).await;
                tracing::warn!("deadline exceeded while the pipeline was unwinding");
                return Ok(run_report(RunOutcome::DeadlineExceeded, report));
            }
            Ok(Err(e)) => return Err(Error::TaskFailed(format!("pipeline supervisor: {}", e))),
            Ok(Ok(result)) => result,
        };

        let (outcome, processed) = classify(result, &report)?;
        let mut run = run_report(outcome, report);
        run.completed = run.completed.max(processed);
        Ok(run)
    }

    fn scope(&self) -> SearchScope {
        SearchScope {
            owner: self.config.owner.clone(),
            include_archived: self.config.catalog.include_archived,
        }
    }

    /// Start the source and the workers, plus a supervisor joining them
    ///
    /// The supervisor sends `PipelineDrained` once everything has unwound.
    fn spawn_pipeline(
        &self,
        progress: ProgressHandle,
        lifetime: RunLifetime,
    ) -> JoinHandle<PipelineResult> {
        let (tx, rx) = mpsc::channel(self.config.clone.dispatch_capacity.max(1));

        let workers = WorkerPool::new(
            self.config.clone.workers,
            Arc::clone(&self.processor),
            self.config.clone.directory.clone(),
            self.config.clone.git_args.clone(),
        )
        .spawn(rx, progress.clone(), lifetime.clone());

        let source = ItemSource::new(
            Arc::clone(&self.catalog),
            self.scope(),
            self.config.catalog.page_size,
        );
        let source_task = {
            let progress = progress.clone();
            let lifetime = lifetime.clone();
            tokio::spawn(async move {
                let result = source.run(tx, progress, lifetime.clone()).await;
                if let Err(e) = &result
                    && !matches!(e, Error::Cancelled(_))
                {
                    tracing::error!(error = %e, "catalog source failed, cancelling run");
                    lifetime.cancel(CancellationCause::Fatal);
                }
                result
            })
        };

        tokio::spawn(async move {
            let (source, workers) = tokio::join!(source_task, join_workers(workers));
            let source = source.unwrap_or_else(|e| {
                tracing::error!(error = %e, "catalog source task failed");
                lifetime.cancel(CancellationCause::Fatal);
                Err(Error::TaskFailed(format!("catalog source: {}", e)))
            });
            progress.pipeline_drained();
            PipelineResult { source, workers }
        })
    }

    /// Cancel, collect the coordinator's final counts, and give the pipeline
    /// a grace period to unwind
    async fn abandon(
        &self,
        lifetime: &RunLifetime,
        cause: CancellationCause,
        coordinator: JoinHandle<CoordinatorReport>,
        pipeline: JoinHandle<PipelineResult>,
    ) -> Result<RunReport> {
        lifetime.cancel(cause);
        tracing::warn!(cause = %cause, "run cancelled before the coordinator terminated");

        let report = match tokio::time::timeout(self.config.grace_period, coordinator).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "progress coordinator failed");
                None
            }
            Err(_) => {
                tracing::warn!("progress coordinator did not stop within the grace period");
                None
            }
        };
        self.grace(pipeline).await;

        Ok(match report {
            Some(report) => run_report(RunOutcome::DeadlineExceeded, report),
            None => RunReport {
                outcome: RunOutcome::DeadlineExceeded,
                completed: 0,
                total: None,
                render_failure: None,
            },
        })
    }

    /// Cancel for a user interrupt and let the pipeline unwind
    async fn abort(
        &self,
        lifetime: &RunLifetime,
        pipeline: JoinHandle<PipelineResult>,
        report: CoordinatorReport,
    ) -> RunReport {
        lifetime.cancel(CancellationCause::UserAbort);
        self.grace(pipeline).await;
        tracing::info!(completed = report.current, "run aborted by user");
        run_report(RunOutcome::Aborted, report)
    }

    /// Wait up to the grace period for the pipeline, then abandon it
    async fn grace(&self, pipeline: JoinHandle<PipelineResult>) {
        match tokio::time::timeout(self.config.grace_period, pipeline).await {
            Ok(Ok(result)) => {
                tracing::debug!(
                    source = ?result.source.as_ref().map(|stats| stats.items),
                    "pipeline unwound after cancellation"
                );
            }
            Ok(Err(e)) => tracing::error!(error = %e, "pipeline supervisor failed"),
            Err(_) => tracing::warn!(
                grace_secs = self.config.grace_period.as_secs_f64(),
                "pipeline did not unwind within the grace period, abandoning it"
            ),
        }
    }
}

/// Classify a pipeline that unwound on its own, returning the outcome and the
/// number of items the workers processed
///
/// A catalog failure wins over item failures; item failures are reported
/// all at once.
fn classify(result: PipelineResult, report: &CoordinatorReport) -> Result<(RunOutcome, u64)> {
    let stats = match result.source {
        Ok(stats) => Some(stats),
        Err(Error::Cancelled(cause)) => {
            tracing::debug!(cause = %cause, "catalog source stopped by cancellation");
            None
        }
        Err(e) => return Err(e),
    };
    let pool = result.workers?;

    if report.exit == CoordinatorExit::Exhausted {
        tracing::warn!(
            completed = report.current,
            total = ?report.total,
            emitted = ?stats.map(|s| s.items),
            "catalog streamed fewer items than it reported"
        );
    }

    tracing::info!(
        processed = pool.processed,
        failed = pool.failures.len(),
        "run finished"
    );

    let outcome = if pool.failures.is_empty() {
        RunOutcome::Completed
    } else {
        RunOutcome::Failed(pool.failures)
    };
    Ok((outcome, pool.processed))
}

fn run_report(outcome: RunOutcome, report: CoordinatorReport) -> RunReport {
    RunReport {
        outcome,
        completed: report.current,
        total: report.total,
        render_failure: report.render_failure,
    }
}
