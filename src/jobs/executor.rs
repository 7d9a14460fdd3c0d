//! Per-job execution.
//!
//! Runs one query against a dedicated connection, exports the result,
//! and reports a `JobResult`. Errors never escape this boundary: every
//! failure becomes a Failure result so one job can never abort a batch.

use super::{JobResult, QueryJob};
use crate::db::ConnectionFactory;
use crate::error::Result;
use crate::export::{run_timestamp, SpreadsheetWriter};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Executes one job end to end.
///
/// Acquires a connection from the factory, runs the query, writes the
/// result table, and returns a structured result. The connection is
/// released on every exit path. This function is infallible by design;
/// the orchestrator relies on always receiving exactly one result.
pub async fn run(
    job: &QueryJob,
    factory: &dyn ConnectionFactory,
    writer: &SpreadsheetWriter,
) -> JobResult {
    let started = Instant::now();
    info!("Starting extraction: {}", job.name);

    match extract(job, factory, writer).await {
        Ok((row_count, paths)) => {
            info!(
                "{}: {row_count} rows exported to {} file(s) in {:.2}s",
                job.name,
                paths.len(),
                started.elapsed().as_secs_f64()
            );
            JobResult::success(&job.name, row_count, paths, started.elapsed())
        }
        Err(e) => {
            error!("{} failed: {e}", job.name);
            JobResult::failure(&job.name, e.to_string(), started.elapsed())
        }
    }
}

/// Runs the query and export, guaranteeing the connection is closed.
async fn extract(
    job: &QueryJob,
    factory: &dyn ConnectionFactory,
    writer: &SpreadsheetWriter,
) -> Result<(usize, Vec<PathBuf>)> {
    let client = factory.connect().await?;

    let outcome = async {
        let table = client.execute_query(&job.source_text).await?;
        let row_count = table.row_count();
        let timestamp = run_timestamp();
        let paths = writer.write(table, &job.name, &timestamp)?;
        Ok((row_count, paths))
    }
    .await;

    // Scoped cleanup: the connection is released whether the query and
    // export succeeded or not.
    if let Err(e) = client.close().await {
        warn!("Error closing connection for {}: {e}", job.name);
    }

    outcome
}
