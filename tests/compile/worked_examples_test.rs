//! The three canonical examples over the `orders` schema: a dimension filter,
//! grouped totals with ordering, and unnest-grouped array dimensions.

use meerkat::compile::{compile, CompileOptions};
use meerkat::model::{
    FilterLeaf, FilterOperator, MemberDef, MemberModifier, MemberType, OrderDirection, Query,
    TableSchema,
};
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

fn orders() -> TableSchema {
    TableSchema::new("orders", "select * from orders")
        .with_measure(MemberDef::new("total_order_amount", "SUM(order_amount)", MemberType::Number))
        .with_dimension(MemberDef::new("order_id", "order_id", MemberType::Number))
        .with_dimension(MemberDef::new("customer_id", "customer_id", MemberType::String))
        .with_dimension(MemberDef::new("order_amount", "order_amount", MemberType::Number))
}

#[test]
fn test_customer_filter() {
    init_logging();
    let query = Query::new()
        .with_dimension("orders.order_id")
        .with_dimension("orders.order_amount")
        .with_filter(FilterLeaf::new("orders.customer_id", FilterOperator::Equals).with_values(["1"]));

    let sql = compile(&query, &[orders()], &CompileOptions::default()).unwrap();

    insta::assert_snapshot!(sql, @r"
    SELECT
      orders__order_id,
      orders__order_amount
    FROM (
    SELECT
      order_id AS orders__order_id,
      order_amount AS orders__order_amount,
      customer_id AS orders__customer_id,
      *
    FROM (select * from orders) AS orders
    ) AS orders
    WHERE orders__customer_id = '1'
    ");
    assert_parses(&sql);
}

#[test]
fn test_group_by_with_ordering() {
    init_logging();
    let query = Query::new()
        .with_measure("orders.total_order_amount")
        .with_dimension("orders.customer_id")
        .with_order("orders.total_order_amount", OrderDirection::Asc)
        .with_order("orders.customer_id", OrderDirection::Asc);

    let sql = compile(&query, &[orders()], &CompileOptions::default()).unwrap();

    assert!(sql.contains("SUM(order_amount) AS orders__total_order_amount"));
    assert!(sql.contains("GROUP BY orders__customer_id"));
    assert!(sql.ends_with("ORDER BY orders__total_order_amount ASC, orders__customer_id ASC"));
    assert_parses(&sql);
}

#[test]
fn test_unnest_group_by() {
    init_logging();
    let schema = TableSchema::new("orders", "select * from orders")
        .with_measure(MemberDef::new("count", "COUNT(*)", MemberType::Number))
        .with_dimension(
            MemberDef::new("letters", "letters", MemberType::StringArray)
                .with_modifier(MemberModifier::unnest_group_by()),
        );
    let query = Query::new()
        .with_measure("orders.count")
        .with_dimension("orders.letters");

    let sql = compile(&query, &[schema.clone()], &CompileOptions::default()).unwrap();

    assert!(sql.contains("ARRAY[UNNEST(letters)] AS orders__letters"));
    assert!(sql.contains("GROUP BY orders__letters"));
    assert_parses(&sql);

    // Without a measure the array groups as a whole.
    let dims_only = Query::new().with_dimension("orders.letters");
    let sql = compile(&dims_only, &[schema], &CompileOptions::default()).unwrap();
    assert!(sql.contains("letters AS orders__letters"));
    assert!(!sql.contains("UNNEST"));
}
