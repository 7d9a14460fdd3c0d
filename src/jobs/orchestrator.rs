//! Batch orchestration.
//!
//! Dispatches jobs across a bounded worker pool and collects one result
//! per job as each completes. Admission is controlled by a semaphore so
//! at most `concurrency` jobs execute simultaneously; collection is
//! message-passing back to the single caller, never shared mutable
//! state.

use super::{executor, BatchSummary, JobResult, QueryJob};
use crate::config::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::db::ConnectionFactory;
use crate::export::SpreadsheetWriter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Incremental progress signals emitted while a batch runs.
///
/// Observability only: front-ends drive progress indicators from these,
/// but batch correctness never depends on them being consumed.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A job acquired a worker slot and began executing.
    JobStarted { job_name: String },
    /// A job finished (success or failure).
    JobFinished { result: JobResult },
}

/// Runs batches of jobs with bounded concurrency.
pub struct BatchRunner {
    factory: Arc<dyn ConnectionFactory>,
    writer: SpreadsheetWriter,
    concurrency: usize,
}

impl BatchRunner {
    /// Creates a runner over the given connection factory and writer.
    pub fn new(factory: Arc<dyn ConnectionFactory>, writer: SpreadsheetWriter) -> Self {
        Self {
            factory,
            writer,
            concurrency: MIN_CONCURRENCY,
        }
    }

    /// Sets the worker pool size, clamped to [1, 10].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        self
    }

    /// Returns the effective worker pool size.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every job to completion and returns the batch summary.
    ///
    /// Blocking from the caller's perspective: returns only once every
    /// submitted job has produced exactly one result. One job's failure
    /// never cancels or blocks the others. Results are collected in
    /// completion order. Progress events are sent on `progress` if a
    /// sender is supplied; a dropped receiver is ignored.
    pub async fn run(
        &self,
        jobs: Vec<QueryJob>,
        progress: Option<UnboundedSender<BatchEvent>>,
    ) -> BatchSummary {
        let started = Instant::now();
        let total = jobs.len();
        info!("Dispatching {total} job(s) across {} worker(s)", self.concurrency);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for job in jobs {
            let factory = Arc::clone(&self.factory);
            let writer = self.writer.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = progress.clone();

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    // The semaphore is never closed while the batch runs;
                    // still, a job must always yield a result.
                    return JobResult::failure(&job.name, "worker pool closed", Duration::ZERO);
                };

                if let Some(tx) = &progress {
                    let _ = tx.send(BatchEvent::JobStarted {
                        job_name: job.name.clone(),
                    });
                }

                let result = executor::run(&job, factory.as_ref(), &writer).await;

                if let Some(tx) = &progress {
                    let _ = tx.send(BatchEvent::JobFinished {
                        result: result.clone(),
                    });
                }

                result
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("Job task panicked: {e}");
                    JobResult::failure("<unknown>", format!("job task panicked: {e}"), Duration::ZERO)
                }
            };
            results.push(result);
        }

        let total_duration = started.elapsed();
        info!(
            "Batch complete: {}/{} succeeded in {:.2} min",
            results.iter().filter(|r| r.is_success()).count(),
            total,
            total_duration.as_secs_f64() / 60.0
        );

        BatchSummary {
            results,
            total_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockConnectionFactory;
    use tokio::sync::mpsc;

    fn select_jobs(n: usize) -> Vec<QueryJob> {
        (0..n)
            .map(|i| QueryJob::new(format!("job_{i}"), "SELECT 1"))
            .collect()
    }

    fn runner_for(factory: &MockConnectionFactory, dir: &std::path::Path) -> BatchRunner {
        BatchRunner::new(
            Arc::new(factory.clone()),
            SpreadsheetWriter::new(dir),
        )
    }

    #[test]
    fn test_concurrency_clamped() {
        let factory = MockConnectionFactory::new();
        let dir = tempfile::tempdir().unwrap();

        let runner = runner_for(&factory, dir.path()).with_concurrency(50);
        assert_eq!(runner.concurrency(), 10);

        let runner = runner_for(&factory, dir.path()).with_concurrency(0);
        assert_eq!(runner.concurrency(), 1);
    }

    #[tokio::test]
    async fn test_every_job_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new();
        let runner = runner_for(&factory, dir.path()).with_concurrency(4);

        let summary = runner.run(select_jobs(7), None).await;

        assert_eq!(summary.len(), 7);
        assert_eq!(summary.success_count(), 7);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new();
        let runner = runner_for(&factory, dir.path());

        let summary = runner.run(Vec::new(), None).await;
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new().with_delay(Duration::from_millis(30));
        let runner = runner_for(&factory, dir.path()).with_concurrency(3);

        let summary = runner.run(select_jobs(9), None).await;

        assert_eq!(summary.len(), 9);
        assert!(
            factory.max_in_flight() <= 3,
            "observed {} concurrent queries with a bound of 3",
            factory.max_in_flight()
        );
    }

    #[tokio::test]
    async fn test_concurrency_one_is_serial() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new().with_delay(Duration::from_millis(10));
        let runner = runner_for(&factory, dir.path()).with_concurrency(1);

        runner.run(select_jobs(4), None).await;
        assert_eq!(factory.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new();
        let runner = runner_for(&factory, dir.path()).with_concurrency(2);

        let jobs = vec![
            QueryJob::new("good_1", "SELECT 1"),
            QueryJob::new("broken", "SELEC oops"),
            QueryJob::new("good_2", "SELECT 2"),
        ];
        let summary = runner.run(jobs, None).await;

        assert_eq!(summary.len(), 3);
        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.failure_count(), 1);

        let failed = summary
            .results
            .iter()
            .find(|r| !r.is_success())
            .unwrap();
        assert_eq!(failed.job_name, "broken");
    }

    #[tokio::test]
    async fn test_progress_events_cover_every_job() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new();
        let runner = runner_for(&factory, dir.path()).with_concurrency(2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = runner.run(select_jobs(5), Some(tx)).await;
        assert_eq!(summary.len(), 5);

        let mut started = 0;
        let mut finished = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                BatchEvent::JobStarted { .. } => started += 1,
                BatchEvent::JobFinished { .. } => finished += 1,
            }
        }
        assert_eq!(started, 5);
        assert_eq!(finished, 5);
    }

    #[tokio::test]
    async fn test_dropped_progress_receiver_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockConnectionFactory::new();
        let runner = runner_for(&factory, dir.path());

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let summary = runner.run(select_jobs(3), Some(tx)).await;
        assert_eq!(summary.len(), 3);
    }
}
