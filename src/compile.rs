//! End-to-end compilation from a semantic query to SQL.
//!
//! ```text
//! Query + [TableSchema] → Resolve → Substitute → Plan Joins → Assemble → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use meerkat::compile::{compile, CompileOptions};
//! use meerkat::model::{MemberDef, MemberType, Query, TableSchema};
//!
//! let orders = TableSchema::new("orders", "select * from orders")
//!     .with_measure(MemberDef::new("total", "SUM(order_amount)", MemberType::Number))
//!     .with_dimension(MemberDef::new("customer_id", "customer_id", MemberType::String));
//!
//! let query = Query::new()
//!     .with_measure("orders.total")
//!     .with_dimension("orders.customer_id");
//!
//! let sql = compile(&query, &[orders], &CompileOptions::default())?;
//! ```

use crate::model::{Query as SemanticQuery, TableSchema};
use crate::semantic::{assemble, OutputColumn};
use crate::sql::query::Query;
use crate::sql::Dialect;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Schema not found: {table}")]
    SchemaNotFound { table: String },

    #[error("Member not found: {member}")]
    MemberNotFound { member: String },

    #[error("Invalid member reference '{member}': expected table.member")]
    InvalidMemberRef { member: String },

    #[error("Unsupported operator '{operator}': {reason}")]
    UnsupportedOperator { operator: String, reason: String },

    #[error("Invalid filter on {member}: {reason}")]
    InvalidFilter { member: String, reason: String },

    #[error("Missing context param: {key}")]
    MissingContextParam { key: String },

    #[error("Invalid join '{sql}': {reason}")]
    InvalidJoin { sql: String, reason: String },

    #[error("No join path reaches table '{table}'")]
    MissingJoinPath { table: String },

    #[error("Join paths start at '{found}', expected '{expected}'")]
    JoinPathStartMismatch { expected: String, found: String },

    #[error("Join path visits '{table}' twice")]
    JoinLoop { table: String },

    #[error("Table '{table}' is reached from different tables")]
    AmbiguousJoinPath { table: String },

    #[error("No join declared from '{left}' to '{right}' on '{on}'")]
    JoinNotDeclared {
        left: String,
        right: String,
        on: String,
    },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name outputs `"table.member"` instead of `table__member`.
    pub use_dot_notation: bool,

    /// SQL dialect to generate.
    pub dialect: Dialect,
}

impl CompileOptions {
    pub fn with_dot_notation(mut self, use_dot_notation: bool) -> Self {
        self.use_dot_notation = use_dot_notation;
        self
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a query to SQL.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated SQL string.
    pub sql: String,

    /// The SQL query AST (for further manipulation if needed).
    pub query: Query,

    /// Selected members with their output names.
    pub columns: Vec<OutputColumn>,

    /// The dialect used for generation.
    pub dialect: Dialect,
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile `query` against `schemas`, keeping the AST and output columns.
pub fn compile_query(
    query: &SemanticQuery,
    schemas: &[TableSchema],
    options: &CompileOptions,
) -> CompileResult<CompileOutput> {
    log::debug!(
        "compiling query: {} measures, {} dimensions, {} schemas",
        query.measures.len(),
        query.dimensions.len(),
        schemas.len()
    );

    let assembled = assemble(query, schemas, options)?;
    let sql = assembled.query.to_sql(options.dialect);

    log::debug!("compiled query to {} bytes of SQL", sql.len());

    Ok(CompileOutput {
        sql,
        query: assembled.query,
        columns: assembled.columns,
        dialect: options.dialect,
    })
}

/// Compile `query` against `schemas` to SQL text.
pub fn compile(
    query: &SemanticQuery,
    schemas: &[TableSchema],
    options: &CompileOptions,
) -> CompileResult<String> {
    compile_query(query, schemas, options).map(|output| output.sql)
}
