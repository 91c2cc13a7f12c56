//! Semantic layer - from member references to a SQL AST.
//!
//! Compilation of a query runs through these components, leaves first:
//!
//! 1. **Resolve** - [`resolver`] maps `table.member` to its declaration
//! 2. **Name** - [`alias`] assigns stable output column names
//! 3. **Substitute** - [`context`] fills `${CONTEXT_PARAMS.X}` placeholders
//! 4. **Join** - [`join`] plans the LEFT JOIN chain between tables
//! 5. **Rewrite** - [`modifier`] unnests or flattens array dimensions
//! 6. **Filter** - [`filter`] lowers the filter tree to WHERE and HAVING
//! 7. **Assemble** - [`assemble`] composes the final statement

pub mod alias;
pub mod assemble;
pub mod context;
pub mod filter;
pub mod join;
pub mod modifier;
pub mod resolver;

pub use alias::{safe_key, AliasNamer, AliasNotation};
pub use assemble::{assemble, AssembledQuery, OutputColumn, GENERATED_TABLE};
pub use context::{apply_context_params, apply_filter_params, substitute_context_params};
pub use filter::{compile_filters, CompiledFilters, FilterColumn, FilterColumns};
pub use join::{JoinGraph, JoinPlan, JoinStep};
pub use modifier::ArrayModifier;
pub use resolver::{split_member_ref, MemberKind, MemberResolver, ResolvedMember};
