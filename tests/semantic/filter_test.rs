//! Filter trees compiled through the public API.

use meerkat::compile::{compile, CompileError, CompileOptions};
use meerkat::model::{FilterLeaf, FilterNode, FilterOperator, MemberDef, MemberType, Query, TableSchema};
use meerkat::semantic::{compile_filters, FilterColumn, FilterColumns, MemberKind};
use meerkat::sql::{col, raw_sql, Dialect, Ident};

fn orders() -> TableSchema {
    TableSchema::new("orders", "select * from orders")
        .with_measure(MemberDef::new("total", "SUM(amount)", MemberType::Number))
        .with_dimension(MemberDef::new("status", "status", MemberType::String))
        .with_dimension(MemberDef::new("amount", "amount", MemberType::Number))
        .with_dimension(MemberDef::new("created_at", "created_at", MemberType::Time))
        .with_dimension(MemberDef::new("tags", "tags", MemberType::StringArray))
}

fn columns() -> FilterColumns {
    let mut columns = FilterColumns::new();
    for (name, kind, member_type) in [
        ("orders.status", MemberKind::Dimension, MemberType::String),
        ("orders.amount", MemberKind::Dimension, MemberType::Number),
        ("orders.tags", MemberKind::Dimension, MemberType::StringArray),
    ] {
        let alias = name.replace('.', "__");
        columns.insert(
            name.to_string(),
            FilterColumn {
                expr: col(Ident::bare(alias)),
                kind,
                member_type,
            },
        );
    }
    columns.insert(
        "orders.total".to_string(),
        FilterColumn {
            expr: raw_sql("SUM(amount)"),
            kind: MemberKind::Measure,
            member_type: MemberType::Number,
        },
    );
    columns
}

fn where_sql(node: FilterNode) -> Option<String> {
    compile_filters(&node, &columns(), Dialect::DuckDb)
        .unwrap()
        .where_clause
        .map(|e| e.to_sql(Dialect::DuckDb))
}

fn leaf(member: &str, operator: FilterOperator, values: &[&str]) -> FilterNode {
    FilterLeaf::new(member, operator)
        .with_values(values.iter().copied())
        .into()
}

#[test]
fn test_empty_groups_produce_nothing() {
    let node = FilterNode::and(vec![FilterNode::or(vec![]), FilterNode::and(vec![])]);
    let compiled = compile_filters(&node, &columns(), Dialect::DuckDb).unwrap();
    assert!(compiled.where_clause.is_none());
    assert!(compiled.having.is_none());
}

#[test]
fn test_scalar_operators() {
    assert_eq!(
        where_sql(leaf("orders.status", FilterOperator::Equals, &["a", "b"])).unwrap(),
        "(orders__status = 'a') AND (orders__status = 'b')"
    );
    assert_eq!(
        where_sql(leaf("orders.amount", FilterOperator::Gte, &["10"])).unwrap(),
        "orders__amount >= 10"
    );
    assert_eq!(
        where_sql(leaf("orders.status", FilterOperator::In, &["a", "b"])).unwrap(),
        "orders__status IN ('a', 'b')"
    );
    assert_eq!(
        where_sql(leaf("orders.status", FilterOperator::Contains, &["it's"])).unwrap(),
        "orders__status ~~* '%it''s%'"
    );
    assert_eq!(
        where_sql(leaf("orders.status", FilterOperator::Set, &[])).unwrap(),
        "orders__status IS NOT NULL"
    );
}

#[test]
fn test_array_operators() {
    assert_eq!(
        where_sql(leaf("orders.tags", FilterOperator::Equals, &["x"])).unwrap(),
        "'x' = ANY(SELECT UNNEST(orders__tags))"
    );
    assert_eq!(
        where_sql(leaf("orders.tags", FilterOperator::NotIn, &["x", "y"])).unwrap(),
        "NOT (orders__tags && ARRAY['x', 'y'])"
    );

    let err = compile_filters(
        &leaf("orders.tags", FilterOperator::Gt, &["x"]),
        &columns(),
        Dialect::DuckDb,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedOperator { .. }));
}

#[test]
fn test_raw_sql_leaves() {
    let template: FilterNode = FilterLeaf::new("orders.status", FilterOperator::Equals)
        .with_sql("lower({member}) = 'open'")
        .into();
    assert_eq!(where_sql(template).unwrap(), "lower(orders__status) = 'open'");

    let subquery: FilterNode = FilterLeaf::new("orders.status", FilterOperator::NotIn)
        .with_sql_expression("SELECT status FROM archived")
        .into();
    assert_eq!(
        where_sql(subquery).unwrap(),
        "orders__status NOT IN (SELECT status FROM archived)"
    );

    let unsupported: FilterNode = FilterLeaf::new("orders.status", FilterOperator::Gt)
        .with_sql("{member} > 1")
        .into();
    assert!(matches!(
        compile_filters(&unsupported, &columns(), Dialect::DuckDb),
        Err(CompileError::UnsupportedOperator { .. })
    ));
}

#[test]
fn test_date_range_requires_two_values() {
    let err = compile_filters(
        &leaf("orders.status", FilterOperator::InDateRange, &["2024-01-01"]),
        &columns(),
        Dialect::DuckDb,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::InvalidFilter { .. }));
}

#[test]
fn test_or_with_measure_and_dimension_through_compile() {
    let query = Query::new()
        .with_measure("orders.total")
        .with_dimension("orders.status")
        .with_filter(FilterNode::or(vec![
            leaf("orders.status", FilterOperator::Equals, &["open"]),
            leaf("orders.total", FilterOperator::Lt, &["100"]),
        ]));
    let sql = compile(&query, &[orders()], &CompileOptions::default()).unwrap();

    assert!(sql.contains("WHERE (orders__status = 'open')"));
    assert!(sql.contains("HAVING (SUM(amount) < 100)"));
}

#[test]
fn test_date_range_through_compile() {
    let query = Query::new().with_dimension("orders.status").with_filter(leaf(
        "orders.created_at",
        FilterOperator::NotInDateRange,
        &["2024-01-01", "2024-12-31"],
    ));
    let sql = compile(&query, &[orders()], &CompileOptions::default()).unwrap();

    assert!(sql.contains("created_at AS orders__created_at"));
    assert!(sql.contains(
        "WHERE (orders__created_at < '2024-01-01') OR (orders__created_at > '2024-12-31')"
    ));
}
