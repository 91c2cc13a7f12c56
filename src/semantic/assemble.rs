//! Query assembly.
//!
//! Builds the full statement for a [`model::Query`]:
//!
//! ```text
//! SELECT <measures>, <dimensions>
//! FROM (
//!   SELECT <dimension projections>, <measure columns>, *
//!   FROM (<schema sql>) AS <table>
//! ) AS <table>
//! [WHERE ...] [GROUP BY <dimension aliases>] [HAVING ...]
//! [ORDER BY ...] [LIMIT n] [OFFSET n]
//! ```
//!
//! Projections come before `*` so that an alias equal to a source column
//! name is the one the outer query sees.
//!
//! With several tables every table gets its own base wrap; the wraps are
//! chained with `LEFT JOIN` and the chain is read as
//! `MEERKAT_GENERATED_TABLE`. The outer query only ever refers to aliases
//! projected by the base wraps.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

use crate::compile::{CompileError, CompileOptions, CompileResult};
use crate::model::{self, MemberType, OrderDirection, TableSchema};
use crate::sql::{
    col, raw_sql, star, table_star, Dialect, Expr, ExprExt, Ident, OrderByExpr, Query, SelectExpr,
    SortDir, TableRef,
};

use super::alias::{safe_key, AliasNamer, AliasNotation};
use super::context::{apply_context_params, apply_filter_params, replace_meerkat_placeholders};
use super::filter::{compile_filters, FilterColumn, FilterColumns};
use super::join::{JoinGraph, JoinPlan};
use super::modifier::ArrayModifier;
use super::resolver::{MemberKind, MemberResolver, ResolvedMember};

/// Alias of the joined source when more than one table participates.
pub const GENERATED_TABLE: &str = "MEERKAT_GENERATED_TABLE";

/// A selected member as it appears in the assembled output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub reference: String,
    pub alias: Ident,
    /// The member's custom alias, or else its underscore name.
    pub label: String,
    pub kind: MemberKind,
    pub member_type: MemberType,
}

/// The assembled statement plus what it projects.
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub query: Query,
    /// Selected measures then dimensions, in query order.
    pub columns: Vec<OutputColumn>,
}

impl AssembledQuery {
    pub fn column(&self, reference: &str) -> Option<&OutputColumn> {
        self.columns.iter().find(|c| c.reference == reference)
    }
}

impl From<OrderDirection> for SortDir {
    fn from(direction: OrderDirection) -> Self {
        match direction {
            OrderDirection::Asc => SortDir::Asc,
            OrderDirection::Desc => SortDir::Desc,
        }
    }
}

// =============================================================================
// Base wrap projections
// =============================================================================

/// Aliased projections of one base wrap, unique by alias.
#[derive(Debug, Default)]
struct Projections {
    items: Vec<SelectExpr>,
    by_alias: HashMap<Ident, Expr>,
}

impl Projections {
    /// Project `expr AS alias` and return the alias actually used.
    ///
    /// An alias already bound to a different expression gets a `__column` suffix.
    fn push(&mut self, expr: Expr, alias: Ident) -> Ident {
        match self.by_alias.get(&alias) {
            Some(existing) if *existing == expr => alias,
            Some(_) => {
                let renamed = Ident {
                    value: format!("{}__column", alias.value),
                    quoted: alias.quoted,
                };
                self.push(expr, renamed)
            }
            None => {
                self.by_alias.insert(alias.clone(), expr.clone());
                self.items.push(expr.alias(alias.clone()));
                alias
            }
        }
    }

    fn into_wrap(self, schema: &TableSchema) -> Query {
        let mut select = self.items;
        select.push(SelectExpr::from(star()));
        Query::new()
            .select(select)
            .from(TableRef::raw(schema.sql.clone()).with_alias(table_ident(&schema.name)))
    }
}

fn table_ident(name: &str) -> Ident {
    Ident::bare(name)
}

/// Matches `<table>.<column>` not preceded by an identifier character, dot or quote.
fn column_ref_regex(table: &str) -> CompileResult<Regex> {
    Regex::new(&format!(
        r#"(^|[^A-Za-z0-9_."]){}\.([A-Za-z_][A-Za-z0-9_]*)"#,
        regex::escape(table)
    ))
    .map_err(|e| CompileError::InvalidQuery {
        reason: format!("cannot scan columns of table '{}': {}", table, e),
    })
}

// =============================================================================
// Assembly
// =============================================================================

/// Members the query touches, by role.
struct Referenced<'q> {
    measures: Vec<ResolvedMember<'q>>,
    dimensions: Vec<ResolvedMember<'q>>,
    filtered: Vec<ResolvedMember<'q>>,
    ordered: Vec<ResolvedMember<'q>>,
}

impl<'q> Referenced<'q> {
    fn all(&self) -> impl Iterator<Item = &ResolvedMember<'q>> {
        self.measures
            .iter()
            .chain(&self.dimensions)
            .chain(&self.filtered)
            .chain(&self.ordered)
    }
}

fn resolve_all<'q>(
    resolver: &MemberResolver<'q>,
    refs: impl IntoIterator<Item = &'q str>,
) -> CompileResult<Vec<ResolvedMember<'q>>> {
    refs.into_iter().map(|r| resolver.resolve(r)).collect()
}

/// Assemble `query` over `schemas`.
pub fn assemble(
    query: &model::Query,
    schemas: &[TableSchema],
    options: &CompileOptions,
) -> CompileResult<AssembledQuery> {
    let select_all = query.selects_all();
    if select_all && query.measures.len() > 1 {
        return Err(CompileError::InvalidQuery {
            reason: "\"*\" cannot be combined with other measures".into(),
        });
    }
    if query.measures.is_empty() && query.dimensions.is_empty() {
        return Err(CompileError::InvalidQuery {
            reason: "query selects no measures or dimensions".into(),
        });
    }

    // Resolution runs against the schemas as given; context and filter
    // params are applied to the used ones afterwards.
    let resolver = MemberResolver::new(schemas);
    let leaves = query.filters.as_ref().map(|f| f.leaves()).unwrap_or_default();
    let referenced = Referenced {
        measures: resolve_all(
            &resolver,
            query.measures.iter().filter(|m| *m != "*").map(String::as_str),
        )?,
        dimensions: resolve_all(&resolver, query.dimensions.iter().map(String::as_str))?,
        filtered: resolve_all(&resolver, leaves.iter().map(|l| l.member.as_str()))?,
        ordered: resolve_all(&resolver, query.order.iter().map(|o| o.member.as_str()))?,
    };
    let has_measures = !referenced.measures.is_empty();

    // Tables in caller order: those referenced by members or join paths.
    let mut wanted: HashSet<&str> = referenced.all().map(|m| m.table.name.as_str()).collect();
    for edge in query.join_paths.iter().flatten().flatten() {
        for table in std::iter::once(edge.left.as_str()).chain(edge.right.as_deref()) {
            resolver.schema(table)?;
            wanted.insert(table);
        }
    }
    let used_schemas: Vec<&TableSchema> = if wanted.is_empty() {
        schemas.iter().collect()
    } else {
        schemas
            .iter()
            .filter(|s| wanted.contains(s.name.as_str()))
            .collect()
    };

    let params = query.context_params.clone().unwrap_or_default();
    let used_schemas: Vec<TableSchema> = used_schemas
        .into_iter()
        .map(|s| {
            apply_context_params(s, &params).and_then(|s| {
                apply_filter_params(&s, query.filters.as_ref(), &resolver, options.dialect)
            })
        })
        .collect::<CompileResult<_>>()?;
    let used_by_name: BTreeMap<&str, &TableSchema> =
        used_schemas.iter().map(|s| (s.name.as_str(), s)).collect();
    let used_names: Vec<&str> = used_schemas.iter().map(|s| s.name.as_str()).collect();

    let graph_schemas: Vec<&TableSchema> = used_schemas.iter().collect();
    let plan = JoinGraph::build(&graph_schemas)?.plan(&used_names, query.join_paths.as_deref())?;

    log::debug!(
        "assembling {} measures, {} dimensions over {} table(s)",
        referenced.measures.len(),
        referenced.dimensions.len(),
        used_names.len()
    );

    let notation = AliasNotation::from_dot_notation(options.use_dot_notation);
    let namer = AliasNamer::new(
        notation,
        referenced
            .all()
            .map(|m| (m.reference, m.def.alias.as_deref(), m.def.sql.as_str())),
    );
    let dialect = options.dialect;

    // -------------------------------------------------------------------------
    // Base wrap projections, one set per table
    // -------------------------------------------------------------------------

    let mut projections: HashMap<&str, Projections> =
        used_names.iter().map(|n| (*n, Projections::default())).collect();
    let filtered_refs: HashSet<&str> = referenced.filtered.iter().map(|m| m.reference).collect();
    let selected_dims: HashSet<&str> = referenced.dimensions.iter().map(|m| m.reference).collect();

    // Filter targets for dimensions: their projected alias, or the unmodified copy.
    let mut dimension_columns: HashMap<&str, Ident> = HashMap::new();

    for dim in &referenced.dimensions {
        let base = dimension_source(dim);
        let modifier = ArrayModifier::for_selected(dim.def, has_measures);
        let target = projections.entry(dim.table.name.as_str()).or_default();
        let alias = target.push(modifier.apply(base.clone()), namer.alias(dim.reference));
        if modifier.is_none() {
            dimension_columns.insert(dim.reference, alias);
        } else if filtered_refs.contains(dim.reference) {
            let copy = target.push(base, namer.unmodified(dim.reference));
            dimension_columns.insert(dim.reference, copy);
        }
    }

    for dim in referenced
        .filtered
        .iter()
        .chain(&referenced.ordered)
        .filter(|m| !m.is_measure() && !selected_dims.contains(m.reference))
    {
        let target = projections.entry(dim.table.name.as_str()).or_default();
        let alias = target.push(dimension_source(dim), namer.alias(dim.reference));
        dimension_columns.entry(dim.reference).or_insert(alias);
    }

    // Columns read by measures, projected where their table is wrapped.
    let patterns: Vec<(&str, Regex)> = used_names
        .iter()
        .map(|name| column_ref_regex(name).map(|re| (*name, re)))
        .collect::<CompileResult<_>>()?;
    let mut column_aliases: HashMap<String, Ident> = HashMap::new();
    for measure in referenced.all().filter(|m| m.is_measure()) {
        let sql = placeholders_to_aliases(measure, &namer, dialect);
        for (table, re) in &patterns {
            for caps in re.captures_iter(&sql) {
                let reference = format!("{}.{}", table, &caps[2]);
                if column_aliases.contains_key(&reference) {
                    continue;
                }
                let target = projections.entry(*table).or_default();
                let alias = target.push(raw_sql(&reference), namer.generated(&reference));
                column_aliases.insert(reference, alias);
            }
        }
    }

    let measure_expr = |member: &ResolvedMember| -> Expr {
        let mut sql = placeholders_to_aliases(member, &namer, dialect);
        for (table, re) in &patterns {
            sql = re
                .replace_all(&sql, |caps: &regex::Captures| {
                    let reference = format!("{}.{}", table, &caps[2]);
                    match column_aliases.get(&reference) {
                        Some(alias) => format!("{}{}", &caps[1], alias.render(dialect)),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned();
        }
        raw_sql(&sql)
    };

    // -------------------------------------------------------------------------
    // FROM: base wraps, joined when needed
    // -------------------------------------------------------------------------

    let mut wraps: HashMap<&str, Query> = HashMap::new();
    for name in &used_names {
        let schema = used_by_name[name];
        let projection = projections.remove(name).unwrap_or_default();
        wraps.insert(*name, projection.into_wrap(schema));
    }
    let (from, outer_alias) = build_from(&plan, &mut wraps)?;

    // -------------------------------------------------------------------------
    // Outer query
    // -------------------------------------------------------------------------

    let mut columns = Vec::new();
    let mut select: Vec<SelectExpr> = Vec::new();

    if select_all {
        select.push(SelectExpr::from(table_star(outer_alias.clone())));
    }
    for measure in &referenced.measures {
        let alias = namer.alias(measure.reference);
        select.push(measure_expr(measure).alias(alias.clone()));
        columns.push(output_column(measure, alias));
    }
    let mut group_by = Vec::new();
    for dim in &referenced.dimensions {
        let alias = namer.alias(dim.reference);
        select.push(SelectExpr::from(col(alias.clone())));
        group_by.push(col(alias.clone()));
        columns.push(output_column(dim, alias));
    }

    let mut outer = Query::new().select(select).from(from.with_alias(outer_alias));

    if let Some(node) = &query.filters {
        let mut filter_columns = FilterColumns::new();
        for member in &referenced.filtered {
            let expr = match member.kind {
                MemberKind::Dimension => col(dimension_columns
                    .get(member.reference)
                    .cloned()
                    .unwrap_or_else(|| namer.alias(member.reference))),
                MemberKind::Measure => measure_expr(member),
            };
            filter_columns.insert(
                member.reference.to_string(),
                FilterColumn {
                    expr,
                    kind: member.kind,
                    member_type: member.member_type(),
                },
            );
        }
        let compiled = compile_filters(node, &filter_columns, dialect)?;
        if compiled.having.is_some() && !has_measures {
            return Err(CompileError::InvalidQuery {
                reason: "filters on measures need at least one selected measure".into(),
            });
        }
        if let Some(predicate) = compiled.where_clause {
            outer = outer.filter(predicate);
        }
        if let Some(predicate) = compiled.having {
            outer = outer.having(predicate);
        }
    }

    if has_measures && !group_by.is_empty() {
        outer = outer.group_by(group_by);
    }

    if !query.order.is_empty() {
        let selected: HashSet<&str> = columns.iter().map(|c| c.reference.as_str()).collect();
        let order_by = query
            .order
            .iter()
            .zip(&referenced.ordered)
            .map(|(entry, member)| {
                let expr = if selected.contains(member.reference) {
                    col(namer.alias(member.reference))
                } else if member.is_measure() {
                    measure_expr(member)
                } else {
                    col(dimension_columns
                        .get(member.reference)
                        .cloned()
                        .unwrap_or_else(|| namer.alias(member.reference)))
                };
                OrderByExpr {
                    expr,
                    dir: Some(entry.direction.into()),
                }
            })
            .collect();
        outer = outer.order_by(order_by);
    }

    if let Some(limit) = query.limit {
        outer = outer.limit(limit);
    }
    if let Some(offset) = query.offset {
        outer = outer.offset(offset);
    }

    Ok(AssembledQuery {
        query: outer,
        columns,
    })
}

/// Dimension SQL as evaluated inside its table's base wrap.
fn dimension_source(dim: &ResolvedMember) -> Expr {
    let table = &dim.table.name;
    let sql = replace_meerkat_placeholders(&dim.def.sql, |column| format!("{}.{}", table, column));
    raw_sql(&sql)
}

/// Measure SQL with `{MEERKAT}.column` pointing at output aliases.
fn placeholders_to_aliases(
    measure: &ResolvedMember,
    namer: &AliasNamer,
    dialect: Dialect,
) -> String {
    let table = &measure.table.name;
    replace_meerkat_placeholders(&measure.def.sql, |column| {
        namer
            .alias(&format!("{}.{}", table, column))
            .render(dialect)
    })
    .into_owned()
}

fn output_column(member: &ResolvedMember, alias: Ident) -> OutputColumn {
    OutputColumn {
        reference: member.reference.to_string(),
        label: member
            .def
            .alias
            .clone()
            .unwrap_or_else(|| safe_key(member.reference)),
        alias,
        kind: member.kind,
        member_type: member.member_type(),
    }
}

/// The FROM source and the alias the outer query reads it under.
fn build_from(plan: &JoinPlan, wraps: &mut HashMap<&str, Query>) -> CompileResult<(TableRef, Ident)> {
    let mut take = |name: &str| {
        wraps
            .remove(name)
            .ok_or_else(|| CompileError::SchemaNotFound {
                table: name.to_string(),
            })
    };

    let start = take(&plan.start)?;
    if plan.is_single() {
        return Ok((TableRef::subquery(start), table_ident(&plan.start)));
    }

    let mut joined = Query::new()
        .select(vec![star()])
        .from(TableRef::subquery(start).with_alias(table_ident(&plan.start)));
    for step in &plan.steps {
        let wrap = take(&step.right)?;
        joined = joined.left_join(
            TableRef::subquery(wrap).with_alias(table_ident(&step.right)),
            raw_sql(&step.sql),
        );
    }
    Ok((TableRef::subquery(joined), Ident::bare(GENERATED_TABLE)))
}
