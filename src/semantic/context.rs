//! Text placeholders in schema SQL.
//!
//! Three kinds are filled in before SQL is assembled:
//!
//! - `${CONTEXT_PARAMS.KEY}` in a table's source `sql`, replaced with the
//!   query's context parameter `KEY`
//! - `${FILTER_PARAMS.<table>.<member>.filter('<column>')}` in a table's
//!   source `sql`, replaced with the query's filters on that member compiled
//!   against `<column>`, or `TRUE` when there are none
//! - `{MEERKAT}.column` in member `sql`, replaced with a reference to the
//!   member `<table>.column` as seen from where the expression is evaluated

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::compile::{CompileError, CompileResult};
use crate::model::{FilterNode, TableSchema};
use crate::sql::{col, Dialect, ExprExt, Ident};

use super::filter::{compile_filters, FilterColumn, FilterColumns};
use super::resolver::{MemberKind, MemberResolver};

static CONTEXT_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{CONTEXT_PARAMS\.([^}]*)\}").unwrap());

static FILTER_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{FILTER_PARAMS\.(\w+\.\w+)\.filter\('(\w+)'\)\}").unwrap()
});

static MEERKAT_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{MEERKAT\}\.([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Replace every `${CONTEXT_PARAMS.KEY}` in `sql`.
///
/// Plain text substitution. A key absent from `params` is an error.
pub fn substitute_context_params(
    sql: &str,
    params: &BTreeMap<String, String>,
) -> CompileResult<String> {
    let mut missing = None;
    let out = CONTEXT_PARAM_RE.replace_all(sql, |caps: &Captures| {
        let key = &caps[1];
        match params.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(CompileError::MissingContextParam { key }),
        None => Ok(out.into_owned()),
    }
}

/// Copy `schema` with its source SQL's context parameters filled in.
///
/// Schemas without placeholders are returned unchanged.
pub fn apply_context_params(
    schema: &TableSchema,
    params: &BTreeMap<String, String>,
) -> CompileResult<TableSchema> {
    if !schema.sql.contains("${CONTEXT_PARAMS.") {
        return Ok(schema.clone());
    }
    log::trace!("substituting context params into schema {}", schema.name);
    Ok(TableSchema {
        sql: substitute_context_params(&schema.sql, params)?,
        ..schema.clone()
    })
}

/// Copy `schema` with every `${FILTER_PARAMS...}` placeholder replaced by
/// the part of `filters` on that member, compiled against the named column.
///
/// Leaves on other members are dropped and the remaining AND/OR shape is
/// kept. A member nobody filters on yields `TRUE`.
pub fn apply_filter_params(
    schema: &TableSchema,
    filters: Option<&FilterNode>,
    resolver: &MemberResolver,
    dialect: Dialect,
) -> CompileResult<TableSchema> {
    if !schema.sql.contains("${FILTER_PARAMS.") {
        return Ok(schema.clone());
    }

    let mut out = String::with_capacity(schema.sql.len());
    let mut last = 0;
    for caps in FILTER_PARAM_RE.captures_iter(&schema.sql) {
        let Some(whole) = caps.get(0) else { continue };
        let (member, column) = (&caps[1], &caps[2]);

        let predicate = match filters.and_then(|f| f.retain_member(member)) {
            Some(subtree) => {
                let mut columns = FilterColumns::new();
                columns.insert(
                    member.to_string(),
                    FilterColumn {
                        expr: col(Ident::bare(column)),
                        kind: MemberKind::Dimension,
                        member_type: resolver.resolve(member)?.member_type(),
                    },
                );
                compile_filters(&subtree, &columns, dialect)?.where_clause
            }
            None => None,
        };
        log::trace!(
            "filter param {} in schema {}: {}",
            member,
            schema.name,
            if predicate.is_some() { "filtered" } else { "TRUE" }
        );

        out.push_str(&schema.sql[last..whole.start()]);
        match predicate {
            Some(predicate) => out.push_str(&predicate.paren().to_sql(dialect)),
            None => out.push_str("TRUE"),
        }
        last = whole.end();
    }
    out.push_str(&schema.sql[last..]);

    Ok(TableSchema {
        sql: out,
        ..schema.clone()
    })
}

/// Rewrite `{MEERKAT}.column` using `replace(column)`.
pub fn replace_meerkat_placeholders<'s>(
    sql: &'s str,
    mut replace: impl FnMut(&str) -> String,
) -> Cow<'s, str> {
    MEERKAT_PLACEHOLDER_RE.replace_all(sql, |caps: &Captures| replace(&caps[1]))
}
