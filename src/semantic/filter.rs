//! Filter tree compilation.
//!
//! A [`FilterNode`] is lowered twice: once keeping only dimension leaves
//! (the WHERE clause) and once keeping only measure leaves (HAVING). Each
//! pass preserves the AND/OR shape restricted to its own leaves; groups that
//! end up empty disappear.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::compile::{CompileError, CompileResult};
use crate::model::{FilterLeaf, FilterNode, FilterOperator, MemberType};
use crate::sql::{
    lit_bool, lit_float, lit_int, lit_str, raw_sql, unnest, BinaryOperator, Dialect, Expr,
    ExprExt,
};

use super::resolver::MemberKind;

static SIMPLE_IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap()
});

/// What a filter leaf on a member compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterColumn {
    /// Dimension alias or rewritten measure expression.
    pub expr: Expr,
    pub kind: MemberKind,
    pub member_type: MemberType,
}

/// Filter columns keyed by member reference.
pub type FilterColumns = HashMap<String, FilterColumn>;

/// Compiled predicates, already partitioned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilters {
    pub where_clause: Option<Expr>,
    pub having: Option<Expr>,
}

/// Compile `node` into WHERE and HAVING predicates.
pub fn compile_filters(
    node: &FilterNode,
    columns: &FilterColumns,
    dialect: Dialect,
) -> CompileResult<CompiledFilters> {
    let compiled = CompiledFilters {
        where_clause: compile_node(node, columns, MemberKind::Dimension, dialect)?,
        having: compile_node(node, columns, MemberKind::Measure, dialect)?,
    };
    log::trace!(
        "filters compiled: where={} having={}",
        compiled.where_clause.is_some(),
        compiled.having.is_some()
    );
    Ok(compiled)
}

fn compile_node(
    node: &FilterNode,
    columns: &FilterColumns,
    bucket: MemberKind,
    dialect: Dialect,
) -> CompileResult<Option<Expr>> {
    match node {
        FilterNode::And { children } => {
            combine(children, columns, bucket, dialect, BinaryOperator::And)
        }
        FilterNode::Or { children } => {
            combine(children, columns, bucket, dialect, BinaryOperator::Or)
        }
        FilterNode::Leaf(leaf) => {
            let column = columns
                .get(&leaf.member)
                .ok_or_else(|| CompileError::MemberNotFound {
                    member: leaf.member.clone(),
                })?;
            if column.kind != bucket {
                return Ok(None);
            }
            compile_leaf(leaf, column, dialect).map(Some)
        }
    }
}

fn combine(
    children: &[FilterNode],
    columns: &FilterColumns,
    bucket: MemberKind,
    dialect: Dialect,
    op: BinaryOperator,
) -> CompileResult<Option<Expr>> {
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        if let Some(expr) = compile_node(child, columns, bucket, dialect)? {
            parts.push(expr.paren());
        }
    }
    Ok(parts.into_iter().reduce(|acc, next| acc.binary(op, next)))
}

/// Parenthesized conjunction of several predicates; a single one is returned as is.
fn conjoin(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        return exprs.remove(0);
    }
    exprs
        .into_iter()
        .map(ExprExt::paren)
        .reduce(|acc, next| acc.and(next))
        .unwrap_or_else(|| lit_bool(true))
}

/// Raw member SQL is parenthesized unless it is a name or a single call.
fn operand(expr: &Expr) -> Expr {
    match expr {
        Expr::Raw(sql) if !is_atomic(sql.trim()) => expr.clone().paren(),
        _ => expr.clone(),
    }
}

/// `a.b` or `f(...)` where the opening paren closes at the very end.
fn is_atomic(sql: &str) -> bool {
    if SIMPLE_IDENT_RE.is_match(sql) {
        return true;
    }
    let Some(open) = sql.find('(') else {
        return false;
    };
    if !SIMPLE_IDENT_RE.is_match(&sql[..open]) || !sql.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    for (i, ch) in sql[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return open + i == sql.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Typed literal for a filter value.
pub fn value_literal(value: &str, member_type: MemberType) -> Expr {
    if member_type.is_numeric() {
        if let Ok(n) = value.trim().parse::<i64>() {
            return lit_int(n);
        }
        if let Ok(f) = value.trim().parse::<f64>() {
            if f.is_finite() {
                return lit_float(f);
            }
        }
    }
    if member_type == MemberType::Boolean {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => return lit_bool(true),
            "false" => return lit_bool(false),
            _ => {}
        }
    }
    lit_str(value)
}

fn unsupported(leaf: &FilterLeaf, reason: &str) -> CompileError {
    CompileError::UnsupportedOperator {
        operator: leaf.operator.as_str().to_string(),
        reason: format!("{} ({})", reason, leaf.member),
    }
}

fn invalid(leaf: &FilterLeaf, reason: &str) -> CompileError {
    CompileError::InvalidFilter {
        member: leaf.member.clone(),
        reason: reason.to_string(),
    }
}

fn compile_leaf(leaf: &FilterLeaf, column: &FilterColumn, dialect: Dialect) -> CompileResult<Expr> {
    let forms = [
        leaf.values.as_ref().is_some_and(|v| !v.is_empty()),
        leaf.sql.is_some(),
        leaf.sql_expression.is_some(),
    ];
    if forms.iter().filter(|set| **set).count() > 1 {
        return Err(invalid(leaf, "only one of values, sql and sqlExpression may be set"));
    }

    let target = operand(&column.expr);

    if let Some(template) = &leaf.sql {
        return match leaf.operator {
            FilterOperator::Equals | FilterOperator::In | FilterOperator::NotIn => {
                let rendered = target.to_sql(dialect);
                Ok(raw_sql(&template.replace("{member}", &rendered)))
            }
            _ => Err(unsupported(leaf, "sql filters support only equals, in and notIn")),
        };
    }

    if let Some(raw) = &leaf.sql_expression {
        return match leaf.operator {
            FilterOperator::In => Ok(target.in_list(vec![raw_sql(raw)])),
            FilterOperator::NotIn => Ok(target.not_in_list(vec![raw_sql(raw)])),
            _ => Err(unsupported(leaf, "sqlExpression filters support only in and notIn")),
        };
    }

    let values: &[String] = leaf.values.as_deref().unwrap_or(&[]);
    if leaf.operator.takes_values() && values.is_empty() {
        return Err(invalid(leaf, "operator requires at least one value"));
    }

    let member_type = column.member_type;
    let literals = || values.iter().map(|v| value_literal(v, member_type));

    if member_type.is_array() {
        return match leaf.operator {
            FilterOperator::Equals => Ok(conjoin(
                literals().map(|v| v.eq_any(unnest(target.clone()))).collect(),
            )),
            FilterOperator::NotEquals => Ok(conjoin(
                literals()
                    .map(|v| v.eq_any(unnest(target.clone())).paren().not())
                    .collect(),
            )),
            FilterOperator::In => Ok(target.overlaps(Expr::Array(literals().collect()))),
            FilterOperator::NotIn => Ok(target
                .overlaps(Expr::Array(literals().collect()))
                .paren()
                .not()),
            FilterOperator::Set => Ok(target.is_not_null()),
            FilterOperator::NotSet => Ok(target.is_null()),
            _ => Err(unsupported(leaf, "operator is not supported on array members")),
        };
    }

    let each = |f: fn(Expr, Expr) -> Expr| -> Expr {
        conjoin(literals().map(|v| f(target.clone(), v)).collect())
    };

    Ok(match leaf.operator {
        FilterOperator::Equals => each(|c, v| c.eq(v)),
        FilterOperator::NotEquals => each(|c, v| c.ne(v)),
        FilterOperator::Gt => each(|c, v| c.gt(v)),
        FilterOperator::Gte => each(|c, v| c.gte(v)),
        FilterOperator::Lt => each(|c, v| c.lt(v)),
        FilterOperator::Lte => each(|c, v| c.lte(v)),
        FilterOperator::Contains => conjoin(
            values
                .iter()
                .map(|v| target.clone().ilike(lit_str(&format!("%{}%", v))))
                .collect(),
        ),
        FilterOperator::NotContains => conjoin(
            values
                .iter()
                .map(|v| target.clone().not_like(lit_str(&format!("%{}%", v))))
                .collect(),
        ),
        FilterOperator::In => target.in_list(literals().collect()),
        FilterOperator::NotIn => target.not_in_list(literals().collect()),
        FilterOperator::InDateRange | FilterOperator::NotInDateRange => {
            let [lo, hi] = values else {
                return Err(invalid(leaf, "date range requires exactly two values"));
            };
            let (lo, hi) = (lit_str(lo), lit_str(hi));
            if leaf.operator == FilterOperator::InDateRange {
                target.clone().gte(lo).paren().and(target.lte(hi).paren())
            } else {
                target.clone().lt(lo).paren().or(target.gt(hi).paren())
            }
        }
        FilterOperator::Set => target.is_not_null(),
        FilterOperator::NotSet => target.is_null(),
    })
}
