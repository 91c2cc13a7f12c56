//! Lookup expansion over a compiled base query.
//!
//! ```text
//! BaseQuery → RowIdAssignment → ArrayUnnest* → LookupJoins → ReAggregateByRowId → FinalProjection
//! ```
//!
//! Every stage wraps the previous one as a subquery. The row id assigned
//! right after the base query is the only thing later stages group and
//! sort by, so the output has the base query's rows in the base query's
//! order.

use std::collections::{BTreeMap, HashSet};

use crate::compile::{CompileError, CompileOptions, CompileResult};
use crate::model::{ColumnResolutionConfig, Query as SemanticQuery, ResolutionConfig, TableSchema};
use crate::semantic::modifier::flatten_array;
use crate::semantic::{
    apply_context_params, apply_filter_params, assemble, safe_key, MemberResolver, OutputColumn,
};
use crate::sql::{
    array_agg_distinct, coalesce, col, max, raw_sql, row_number, star, star_exclude, table_col,
    Expr, ExprExt, Ident, OrderByExpr, Query, SelectExpr, TableRef,
};

/// Row identifier carried through every stage.
pub const ROW_ID: &str = "__row_id";

const BASE_QUERY: &str = "__base_query";
const UNNEST_QUERY: &str = "__unnest_query";
const RESOLUTION_BASE: &str = "__resolution_base";
const RESOLVED_QUERY: &str = "__resolved_query";
const AGGREGATED_QUERY: &str = "__aggregated_query";

fn row_id() -> Ident {
    Ident::bare(ROW_ID)
}

/// A column flowing through the stages after the base query.
#[derive(Debug, Clone)]
struct StageColumn {
    name: Ident,
    /// Collected back into an array when re-aggregating.
    is_array: bool,
}

/// A column to resolve, matched to its base output and lookup schema.
struct Lookup<'a> {
    config: &'a ColumnResolutionConfig,
    base: &'a OutputColumn,
    schema: TableSchema,
}

/// Compile `query` and expand the configured columns into lookup values.
///
/// `column_projections` narrows the output to the listed member references;
/// lookups for columns outside it are skipped. `context_params` are merged
/// over the query's own.
pub fn compile_with_resolution(
    query: &SemanticQuery,
    schemas: &[TableSchema],
    resolution: &ResolutionConfig,
    column_projections: Option<&[String]>,
    context_params: Option<&BTreeMap<String, String>>,
    options: &CompileOptions,
) -> CompileResult<String> {
    let mut query = query.clone();
    if let Some(params) = context_params {
        query
            .context_params
            .get_or_insert_with(BTreeMap::new)
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    let params = query.context_params.clone().unwrap_or_default();

    if !resolution.column_configs.is_empty() && query.selects_all() {
        return Err(CompileError::InvalidQuery {
            reason: "\"*\" cannot be combined with column resolution".into(),
        });
    }

    // BaseQuery
    let mut base = assemble(&query, schemas, options)?;
    let base_query = std::mem::take(&mut base.query);
    log::trace!("resolution: base query has {} columns", base.columns.len());
    let base_column = |reference: &str| base.column(reference);

    let carried: Vec<&OutputColumn> = match column_projections {
        Some(projections) => projections
            .iter()
            .map(|reference| {
                base_column(reference).ok_or_else(|| CompileError::InvalidQuery {
                    reason: format!("projected column {} is not selected", reference),
                })
            })
            .collect::<CompileResult<_>>()?,
        None => base.columns.iter().collect(),
    };
    let carried_refs: HashSet<&str> = carried.iter().map(|c| c.reference.as_str()).collect();

    // Lookup tables see none of the query's filters.
    let lookup_resolver = MemberResolver::new(&resolution.table_schemas);
    let mut lookups = Vec::new();
    let mut seen = HashSet::new();
    for config in &resolution.column_configs {
        let selected = base_column(&config.name).ok_or_else(|| CompileError::InvalidQuery {
            reason: format!("resolution column {} is not selected", config.name),
        })?;
        if !carried_refs.contains(config.name.as_str()) {
            log::trace!("resolution: {} is not projected, skipping lookup", config.name);
            continue;
        }
        if !seen.insert(config.name.as_str()) {
            log::warn!("resolution: duplicate config for {}, keeping the first", config.name);
            continue;
        }
        let source = resolution
            .table_schemas
            .iter()
            .find(|s| s.name == config.source)
            .ok_or_else(|| CompileError::SchemaNotFound {
                table: config.source.clone(),
            })?;
        lookups.push(Lookup {
            config,
            base: selected,
            schema: apply_filter_params(
                &apply_context_params(source, &params)?,
                None,
                &lookup_resolver,
                options.dialect,
            )?,
        });
    }

    // RowIdAssignment
    let dialect = options.dialect;
    let window_order: Vec<OrderByExpr> = query
        .order
        .iter()
        .filter_map(|entry| {
            let column = base_column(&entry.member)?;
            let expr = table_col(Ident::bare(BASE_QUERY), column.alias.clone());
            Some(OrderByExpr::new(expr).with_dir(entry.direction.into()))
        })
        .collect();
    let row_number_expr = row_number().over(window_order);

    let mut select: Vec<SelectExpr> = if column_projections.is_some() {
        carried
            .iter()
            .map(|c| SelectExpr::from(table_col(Ident::bare(BASE_QUERY), c.alias.clone())))
            .collect()
    } else {
        vec![SelectExpr::from(star())]
    };
    select.push(row_number_expr.alias(row_id()));
    let mut stage = Query::new()
        .select(select)
        .from(TableRef::subquery(base_query).with_alias(Ident::bare(BASE_QUERY)));

    if lookups.is_empty() {
        log::debug!("resolution: no lookups, returning base query with row ids");
        return Ok(stage.to_sql(dialect));
    }

    // ArrayUnnest
    for lookup in lookups.iter().filter(|l| l.config.is_array_type) {
        log::trace!("resolution: unnesting {}", lookup.config.name);
        let mut select = vec![SelectExpr::from(col(row_id()))];
        for column in &carried {
            let expr = col(column.alias.clone());
            select.push(if column.reference == lookup.config.name {
                flatten_array(expr).alias(column.alias.clone())
            } else {
                SelectExpr::from(expr)
            });
        }
        stage = Query::new()
            .select(select)
            .from(TableRef::subquery(stage).with_alias(Ident::bare(UNNEST_QUERY)));
    }

    // LookupJoins
    let resolution_base = || Ident::bare(RESOLUTION_BASE);
    let mut select = vec![SelectExpr::from(table_col(resolution_base(), row_id()))];
    let mut columns: Vec<StageColumn> = Vec::new();
    let mut joins = Vec::new();

    for column in &carried {
        match lookups.iter().find(|l| l.config.name == column.reference) {
            None => {
                select.push(SelectExpr::from(table_col(resolution_base(), column.alias.clone())));
                columns.push(StageColumn {
                    name: column.alias.clone(),
                    is_array: false,
                });
            }
            Some(lookup) => {
                let lookup_alias = Ident::bare(safe_key(&lookup.config.name));
                for resolution_column in &lookup.config.resolution_columns {
                    let def = lookup.schema.dimension(resolution_column).ok_or_else(|| {
                        CompileError::MemberNotFound {
                            member: format!("{}.{}", lookup.schema.name, resolution_column),
                        }
                    })?;
                    let label = format!(
                        "{} - {}",
                        lookup.base.label,
                        def.alias.as_deref().unwrap_or(&def.name)
                    );
                    let name = Ident::quoted(label);
                    select.push(
                        table_col(lookup_alias.clone(), Ident::quoted(resolution_column.clone()))
                            .alias(name.clone()),
                    );
                    columns.push(StageColumn {
                        name,
                        is_array: lookup.config.is_array_type,
                    });
                }

                let on = table_col(resolution_base(), lookup.base.alias.clone()).eq(table_col(
                    lookup_alias.clone(),
                    Ident::quoted(lookup.config.join_column.clone()),
                ));
                joins.push((lookup_table(lookup).with_alias(lookup_alias), on));
            }
        }
    }

    log::trace!("resolution: joining {} lookup tables", joins.len());
    let mut resolved = Query::new()
        .select(select)
        .from(TableRef::subquery(stage).with_alias(resolution_base()));
    for (table, on) in joins {
        resolved = resolved.left_join(table, on);
    }

    // ReAggregateByRowId
    let mut select = vec![SelectExpr::from(col(row_id()))];
    for column in &columns {
        let value = col(column.name.clone());
        let aggregate = if column.is_array {
            coalesce(vec![
                array_agg_distinct(value.clone()).filter_where(value.is_not_null()),
                Expr::List(vec![]),
            ])
        } else {
            max(value)
        };
        select.push(aggregate.alias(column.name.clone()));
    }
    let aggregated = Query::new()
        .select(select)
        .from(TableRef::subquery(resolved).with_alias(Ident::bare(RESOLVED_QUERY)))
        .group_by(vec![col(row_id())]);

    // FinalProjection
    let output = Query::new()
        .select(vec![star_exclude(vec![row_id()])])
        .from(TableRef::subquery(aggregated).with_alias(Ident::bare(AGGREGATED_QUERY)))
        .order_by(vec![OrderByExpr::new(col(row_id()))]);

    let sql = output.to_sql(dialect);
    log::debug!(
        "resolution: {} lookups compiled to {} bytes of SQL",
        lookups.len(),
        sql.len()
    );
    Ok(sql)
}

/// The lookup schema with the join column and resolution columns projected by name.
fn lookup_table(lookup: &Lookup) -> TableRef {
    let schema = &lookup.schema;
    let mut names: Vec<&str> = vec![lookup.config.join_column.as_str()];
    for column in &lookup.config.resolution_columns {
        if !names.contains(&column.as_str()) {
            names.push(column);
        }
    }

    let select: Vec<SelectExpr> = names
        .into_iter()
        .map(|name| {
            // The join column may be a plain source column rather than a dimension.
            let sql = schema
                .dimension(name)
                .map(|d| d.sql.clone())
                .unwrap_or_else(|| name.to_string());
            raw_sql(&sql).alias(Ident::quoted(name))
        })
        .collect();

    let query = Query::new()
        .select(select)
        .from(TableRef::raw(schema.sql.clone()).with_alias(Ident::bare(schema.name.clone())));
    TableRef::subquery(query)
}
