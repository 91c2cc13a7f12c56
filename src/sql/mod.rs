//! SQL AST and rendering.
//!
//! Statements are built as [`Query`] values, flattened into a
//! [`TokenStream`] and serialized once for a [`Dialect`].

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::Dialect;
pub use expr::{
    array_agg_distinct, case_when, coalesce, col, func, len, lit_bool, lit_float, lit_int,
    lit_null, lit_str, max, raw_sql, row_number, star, star_exclude, table_col, table_star,
    unnest, BinaryOperator, Expr, ExprExt, Literal, OrderByExpr, SortDir,
};
pub use query::{Join, Query, SelectExpr, TableRef, TableSource};
pub use token::{Ident, Keyword, Token, TokenStream};
