//! Job pipeline for sqlharvest.
//!
//! A job is one SQL script slated for independent execution and export;
//! a batch is the full set of jobs submitted together. This module holds
//! the job data model plus the loader, the per-job executor, and the
//! batch orchestrator.

pub mod executor;
pub mod loader;
pub mod orchestrator;

pub use loader::list_jobs;
pub use orchestrator::{BatchEvent, BatchRunner};

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;

/// One SQL query script ready for execution.
///
/// Immutable once loaded; consumed by exactly one executor invocation.
#[derive(Debug, Clone)]
pub struct QueryJob {
    /// Job name derived from the file name (extension stripped).
    pub name: String,

    /// Full query text, executed verbatim.
    pub source_text: String,

    /// When the job was loaded.
    pub created_at: DateTime<Local>,
}

impl QueryJob {
    /// Creates a job from a name and query text.
    pub fn new(name: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_text: source_text.into(),
            created_at: Local::now(),
        }
    }
}

/// Outcome of one job execution.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Query ran and all output files were written.
    Success,
    /// Anything went wrong; carries a human-readable message.
    Failure(String),
}

/// The complete record of one executed job.
///
/// Created by the executor on completion, collected by the orchestrator,
/// immutable after creation.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Name of the job this result belongs to.
    pub job_name: String,

    /// Success or failure with message.
    pub status: JobStatus,

    /// Rows fetched from the database (0 on failure).
    pub row_count: usize,

    /// Files written, in part order (empty on failure).
    pub output_paths: Vec<PathBuf>,

    /// Wall-clock time from the start of connection acquisition to
    /// export completion.
    pub duration: Duration,
}

impl JobResult {
    /// Creates a success result.
    pub fn success(
        job_name: impl Into<String>,
        row_count: usize,
        output_paths: Vec<PathBuf>,
        duration: Duration,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Success,
            row_count,
            output_paths,
            duration,
        }
    }

    /// Creates a failure result with the given message.
    pub fn failure(job_name: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Failure(message.into()),
            row_count: 0,
            output_paths: Vec::new(),
            duration,
        }
    }

    /// Returns true if the job succeeded.
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// Returns the failure message, if any.
    pub fn failure_message(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Success => None,
            JobStatus::Failure(msg) => Some(msg),
        }
    }

    /// Duration in minutes, the unit used by the summary report.
    pub fn duration_minutes(&self) -> f64 {
        self.duration.as_secs_f64() / 60.0
    }
}

/// Aggregate record of a batch run, one entry per submitted job.
///
/// Results appear in completion order, not submission order.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Per-job results in completion order.
    pub results: Vec<JobResult>,

    /// Wall-clock time for the whole batch.
    pub total_duration: Duration,
}

impl BatchSummary {
    /// Number of jobs in the batch.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if no jobs were run.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of jobs that succeeded.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of jobs that failed.
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}
