//! Input data model: queries, table schemas, filters and resolution configs.
//!
//! Every type here is plain data with serde support. Field names follow the
//! camelCase JSON shape callers send (`joinPaths`, `shouldUnnestGroupBy`,
//! `sqlExpression`, ...).

pub mod filter;
pub mod query;
pub mod resolution;
pub mod table;
pub mod types;

pub use filter::{FilterLeaf, FilterNode, FilterOperator};
pub use query::{JoinEdge, OrderDirection, OrderEntry, Query};
pub use resolution::{ColumnResolutionConfig, ResolutionConfig};
pub use table::{MemberDef, MemberModifier, TableJoin, TableSchema};
pub use types::MemberType;
