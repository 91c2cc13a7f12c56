//! Execution engine boundary.
//!
//! The compiler never runs SQL. Callers hand it to a [`QueryEngine`], which
//! wraps whatever database actually executes it (DuckDB in-process, a
//! remote service, a test double).
//!
//! # Example
//!
//! ```ignore
//! use meerkat::engine::{execute_compiled, QueryEngine};
//!
//! async fn run(engine: &impl QueryEngine) -> Result<(), EngineError> {
//!     let rows = execute_compiled(engine, &query, &schemas, &options, settings.engine.timeout()).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::compile::{compile, CompileError, CompileOptions};
use crate::model::{Query, TableSchema};

/// One result row keyed by output column name.
pub type Row = Map<String, Value>;

/// Rows returned by the engine, in result order.
pub type Rows = Vec<Row>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while compiling or executing a query.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine rejected or failed to run the statement.
    #[error("query execution failed: {0}")]
    Execution(String),

    /// The engine did not answer in time.
    #[error("query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The query did not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Executes SQL text and returns rows.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(&self, sql: &str) -> EngineResult<Rows>;
}

/// Run `sql` on `engine`, giving up after `timeout`.
///
/// The engine future is dropped on timeout.
pub async fn execute_sql<E>(engine: &E, sql: &str, timeout: Duration) -> EngineResult<Rows>
where
    E: QueryEngine + ?Sized,
{
    match tokio::time::timeout(timeout, engine.execute(sql)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("query timed out after {:?}", timeout);
            Err(EngineError::Timeout(timeout))
        }
    }
}

/// Compile `query` and run it on `engine`.
pub async fn execute_compiled<E>(
    engine: &E,
    query: &Query,
    schemas: &[TableSchema],
    options: &CompileOptions,
    timeout: Duration,
) -> EngineResult<Rows>
where
    E: QueryEngine + ?Sized,
{
    let sql = compile(query, schemas, options)?;
    let rows = execute_sql(engine, &sql, timeout).await?;
    log::debug!("engine returned {} rows", rows.len());
    Ok(rows)
}
