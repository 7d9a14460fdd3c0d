//! Database abstraction layer for sqlharvest.
//!
//! Provides trait-based interfaces for connections and query execution,
//! allowing the job pipeline to run against real databases or in-memory
//! fakes interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::{FailingConnectionFactory, MockConnectionFactory};
pub use postgres::PostgresFactory;
pub use types::{ColumnInfo, ResultTable, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// All operations are async and return Results with HarvestError.
#[async_trait]
pub trait DatabaseClient: Send + Sync + std::fmt::Debug {
    /// Executes a SQL query and materializes the full result set.
    async fn execute_query(&self, sql: &str) -> Result<ResultTable>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

/// Produces one dedicated connection per job.
///
/// Each job executor invocation acquires its own connection through this
/// factory and owns it exclusively for the duration of the job; no
/// connection is shared or reused across jobs.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new connection, or fails with a Connection error.
    async fn connect(&self) -> Result<Box<dyn DatabaseClient>>;
}
