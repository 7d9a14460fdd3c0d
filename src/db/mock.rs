//! Mock connection factory for testing.
//!
//! Provides in-memory database fakes so the job pipeline can be exercised
//! without a live server. The mock factory also tracks how many queries
//! run at the same time, which lets orchestrator tests observe the
//! concurrency bound.

use super::{ColumnInfo, ConnectionFactory, DatabaseClient, ResultTable, Value};
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared execution counters for observing mock activity.
#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    max_active: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// A connection factory yielding scripted in-memory clients.
///
/// Query behavior is driven by the SQL text itself: statements starting
/// with `SELECT` succeed, anything else fails with a query error. A
/// `-- rows=N` comment controls how many rows the result carries
/// (default 1).
#[derive(Debug, Clone, Default)]
pub struct MockConnectionFactory {
    delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl MockConnectionFactory {
    /// Creates a new mock factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial per-query delay, useful for overlapping jobs in
    /// concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of queries observed executing simultaneously.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    /// Number of connections handed out so far.
    pub fn connections_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed so far.
    pub fn connections_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient {
            delay: self.delay,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// In-memory client backing `MockConnectionFactory`.
#[derive(Debug)]
struct MockDatabaseClient {
    delay: Option<Duration>,
    counters: Arc<Counters>,
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&self, sql: &str) -> Result<ResultTable> {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = run_scripted_query(sql);

        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn close(&self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Produces a scripted result for the given SQL text.
fn run_scripted_query(sql: &str) -> Result<ResultTable> {
    let statement = sql
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--"))
        .unwrap_or("");

    if !statement.to_uppercase().starts_with("SELECT") {
        let token = statement.split_whitespace().next().unwrap_or("");
        return Err(HarvestError::query(format!(
            "syntax error at or near \"{token}\""
        )));
    }

    let row_count = rows_directive(sql).unwrap_or(1);

    let columns = vec![
        ColumnInfo::new("id", "INT8"),
        ColumnInfo::new("label", "TEXT"),
    ];
    let rows = (1..=row_count)
        .map(|i| vec![Value::Int(i as i64), Value::String(format!("row {i}"))])
        .collect();

    Ok(ResultTable::with_data(columns, rows))
}

/// Parses a `-- rows=N` directive from the SQL text, if present.
fn rows_directive(sql: &str) -> Option<usize> {
    sql.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("--"))
        .find_map(|line| {
            let (_, value) = line.split_once("rows=")?;
            value.trim().parse().ok()
        })
}

/// A connection factory whose connections always fail to open.
#[derive(Debug, Clone)]
pub struct FailingConnectionFactory {
    message: String,
}

impl FailingConnectionFactory {
    /// Creates a factory that fails with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingConnectionFactory {
    fn default() -> Self {
        Self::new("Cannot connect to localhost:5432. Check that the server is running.")
    }
}

#[async_trait]
impl ConnectionFactory for FailingConnectionFactory {
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>> {
        Err(HarvestError::connection(self.message.clone()))
    }
}
