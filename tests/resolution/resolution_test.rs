//! Lookup expansion over compiled queries.

use std::collections::BTreeMap;

use meerkat::compile::{CompileError, CompileOptions};
use meerkat::model::{
    ColumnResolutionConfig, MemberDef, MemberType, OrderDirection, Query, ResolutionConfig,
    TableSchema,
};
use meerkat::resolution::{compile_with_resolution, ROW_ID};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_parses(sql: &str) {
    if let Err(e) = Parser::parse_sql(&DuckDbDialect {}, sql) {
        panic!("generated SQL does not parse: {}\n{}", e, sql);
    }
}

fn tickets() -> TableSchema {
    TableSchema::new("tickets", "select * from tickets")
        .with_measure(MemberDef::new("count", "COUNT(*)", MemberType::Number))
        .with_dimension(MemberDef::new("id", "id", MemberType::Number))
        .with_dimension(MemberDef::new("assignee_id", "assignee_id", MemberType::String))
        .with_dimension(MemberDef::new("watcher_ids", "watcher_ids", MemberType::StringArray))
}

fn users() -> TableSchema {
    TableSchema::new("users", "select * from users")
        .with_dimension(MemberDef::new("id", "id", MemberType::String))
        .with_dimension(MemberDef::new("email", "email", MemberType::String).with_alias("Email"))
        .with_dimension(MemberDef::new("name", "name", MemberType::String))
}

fn resolution() -> ResolutionConfig {
    ResolutionConfig::new()
        .with_column(
            ColumnResolutionConfig::new("tickets.assignee_id", "users", "id")
                .with_resolution_column("name")
                .with_resolution_column("email"),
        )
        .with_column(
            ColumnResolutionConfig::new("tickets.watcher_ids", "users", "id")
                .array()
                .with_resolution_column("name"),
        )
        .with_table_schema(users())
}

fn listing() -> Query {
    Query::new()
        .with_dimension("tickets.id")
        .with_dimension("tickets.assignee_id")
        .with_dimension("tickets.watcher_ids")
        .with_order("tickets.id", OrderDirection::Desc)
        .with_limit(50)
}

#[test]
fn test_stages_wrap_in_order() {
    init_logging();
    let sql = compile_with_resolution(
        &listing(),
        &[tickets()],
        &resolution(),
        None,
        None,
        &CompileOptions::default(),
    )
    .unwrap();

    let stages = [
        ") AS __base_query",
        ") AS __unnest_query",
        ") AS __resolution_base",
        ") AS __resolved_query",
        ") AS __aggregated_query",
    ];
    let positions: Vec<usize> = stages.iter().map(|s| sql.find(s).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", sql);

    // Base ordering and limit stay inside the base query; the row id carries them out.
    assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY __base_query.tickets__id DESC)"));
    assert!(sql.contains("LIMIT 50\n) AS __base_query"));
    assert!(sql.ends_with(&format!("ORDER BY {}", ROW_ID)));
    assert_parses(&sql);
}

#[test]
fn test_labels_and_aggregates() {
    let sql = compile_with_resolution(
        &listing(),
        &[tickets()],
        &resolution(),
        None,
        None,
        &CompileOptions::default(),
    )
    .unwrap();

    assert!(sql.contains("tickets__assignee_id.\"name\" AS \"tickets__assignee_id - name\""));
    assert!(sql.contains("tickets__assignee_id.\"email\" AS \"tickets__assignee_id - Email\""));
    assert!(sql.contains("MAX(\"tickets__assignee_id - Email\")"));
    assert!(sql.contains("ARRAY_AGG(DISTINCT \"tickets__watcher_ids - name\")"));
    assert!(sql.contains("MAX(tickets__id) AS tickets__id"));
    // Each lookup table is joined once per configured column.
    assert_eq!(sql.matches("LEFT JOIN").count(), 2);
}

#[test]
fn test_dot_notation_labels_use_underscore_names() {
    let options = CompileOptions::default().with_dot_notation(true);
    let sql = compile_with_resolution(&listing(), &[tickets()], &resolution(), None, None, &options)
        .unwrap();

    assert!(sql.contains("AS \"tickets__assignee_id - name\""));
    assert!(!sql.contains("\"tickets.assignee_id - name\""));
    assert!(sql.contains(
        "ON __resolution_base.\"tickets.assignee_id\" = tickets__assignee_id.\"id\""
    ));
    assert_parses(&sql);
}

#[test]
fn test_projections_skip_lookups() {
    let projections = vec!["tickets.id".to_string(), "tickets.assignee_id".to_string()];
    let sql = compile_with_resolution(
        &listing(),
        &[tickets()],
        &resolution(),
        Some(&projections),
        None,
        &CompileOptions::default(),
    )
    .unwrap();

    assert_eq!(sql.matches("LEFT JOIN").count(), 1);
    assert!(!sql.contains("__unnest_query"));
    assert!(!sql.contains("tickets__watcher_ids -"));
    assert_parses(&sql);

    let unknown = vec!["tickets.count".to_string()];
    assert!(matches!(
        compile_with_resolution(
            &listing(),
            &[tickets()],
            &resolution(),
            Some(&unknown),
            None,
            &CompileOptions::default(),
        ),
        Err(CompileError::InvalidQuery { .. })
    ));
}

#[test]
fn test_grouped_base_query() {
    let query = Query::new()
        .with_measure("tickets.count")
        .with_dimension("tickets.assignee_id");
    let resolution = ResolutionConfig::new()
        .with_column(
            ColumnResolutionConfig::new("tickets.assignee_id", "users", "id")
                .with_resolution_column("name"),
        )
        .with_table_schema(users());
    let sql = compile_with_resolution(
        &query,
        &[tickets()],
        &resolution,
        None,
        None,
        &CompileOptions::default(),
    )
    .unwrap();

    assert!(sql.contains("GROUP BY tickets__assignee_id\n) AS __base_query"));
    assert!(sql.contains("MAX(tickets__count) AS tickets__count"));
    assert!(sql.contains("ROW_NUMBER() OVER () AS __row_id"));
    assert_parses(&sql);
}

#[test]
fn test_context_params_reach_base_and_lookup() {
    let scoped_users = TableSchema {
        sql: "select * from users where org = '${CONTEXT_PARAMS.ORG}'".into(),
        ..users()
    };
    let scoped_tickets = TableSchema {
        sql: "select * from tickets where org = '${CONTEXT_PARAMS.ORG}'".into(),
        ..tickets()
    };
    let resolution = ResolutionConfig::new()
        .with_column(
            ColumnResolutionConfig::new("tickets.assignee_id", "users", "id")
                .with_resolution_column("name"),
        )
        .with_table_schema(scoped_users);
    let query = Query::new().with_dimension("tickets.assignee_id");
    let params = BTreeMap::from([("ORG".to_string(), "o-1".to_string())]);

    let sql = compile_with_resolution(
        &query,
        &[scoped_tickets],
        &resolution,
        None,
        Some(&params),
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(sql.matches("where org = 'o-1'").count(), 2);
}
