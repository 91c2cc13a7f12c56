//! # Meerkat
//!
//! A semantic-query compiler that turns measure/dimension queries over
//! declared table schemas into DuckDB SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Query + TableSchemas (serde model)              │
//! │  (measures, dimensions, filters, order, join paths)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic]
//! ┌─────────────────────────────────────────────────────────┐
//! │  resolve members → substitute context → plan joins       │
//! │  → name aliases → compile filters → assemble             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolution, optional]
//! ┌─────────────────────────────────────────────────────────┐
//! │  row ids → unnest → lookup joins → re-aggregate          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SQL text                              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Rows                                │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod engine;
pub mod model;
pub mod resolution;
pub mod semantic;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{
        compile, compile_query, CompileError, CompileOptions, CompileOutput, CompileResult,
    };
    pub use crate::config::Settings;
    pub use crate::engine::{execute_compiled, EngineError, QueryEngine, Rows};
    pub use crate::model::{
        ColumnResolutionConfig, FilterLeaf, FilterNode, FilterOperator, JoinEdge, MemberDef,
        MemberModifier, MemberType, OrderDirection, Query, ResolutionConfig, TableSchema,
    };
    pub use crate::resolution::compile_with_resolution;
    pub use crate::sql::Dialect;
}

// Also export at crate root for convenience
pub use compile::{compile, CompileError, CompileOptions, CompileResult};
pub use resolution::compile_with_resolution;
