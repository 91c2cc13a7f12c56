//! Join planning observed through compiled SQL.

use meerkat::compile::{compile, CompileError, CompileOptions};
use meerkat::model::{JoinEdge, MemberDef, MemberType, Query, TableSchema};
use meerkat::semantic::{JoinGraph, GENERATED_TABLE};

fn schemas() -> Vec<TableSchema> {
    vec![
        TableSchema::new("orders", "select * from orders")
            .with_measure(MemberDef::new("count", "COUNT(*)", MemberType::Number))
            .with_dimension(MemberDef::new("id", "id", MemberType::Number))
            .with_join("orders.customer_id = customers.id")
            .with_join("orders.product_id = products.id"),
        TableSchema::new("customers", "select * from customers")
            .with_dimension(MemberDef::new("name", "name", MemberType::String)),
        TableSchema::new("products", "select * from products")
            .with_dimension(MemberDef::new("sku", "sku", MemberType::String)),
    ]
}

#[test]
fn test_fallback_joins_in_declaration_order() {
    let query = Query::new()
        .with_measure("orders.count")
        .with_dimension("products.sku")
        .with_dimension("customers.name");
    let sql = compile(&query, &schemas(), &CompileOptions::default()).unwrap();

    let customers = sql.find("ON orders.customer_id = customers.id").unwrap();
    let products = sql.find("ON orders.product_id = products.id").unwrap();
    assert!(customers < products);
    assert_eq!(sql.matches("LEFT JOIN").count(), 2);
    assert!(sql.contains(&format!(") AS {}", GENERATED_TABLE)));
}

#[test]
fn test_start_is_first_table_reaching_all() {
    // customers comes first but declares nothing, so the walk starts from orders.
    let mut schemas = schemas();
    schemas.rotate_left(1);
    let query = Query::new()
        .with_dimension("customers.name")
        .with_dimension("orders.id");
    let sql = compile(&query, &schemas, &CompileOptions::default()).unwrap();
    assert!(sql.contains(") AS orders\nLEFT JOIN ("));
}

#[test]
fn test_explicit_paths_from_json() {
    let query: Query = serde_json::from_value(serde_json::json!({
        "dimensions": ["orders.id", "products.sku"],
        "joinPaths": [
            [{"left": "orders"}],
            [{"left": "orders", "right": "products", "on": "product_id"}]
        ]
    }))
    .unwrap();
    let sql = compile(&query, &schemas(), &CompileOptions::default()).unwrap();

    assert_eq!(sql.matches("LEFT JOIN").count(), 1);
    assert!(sql.contains("ON orders.product_id = products.id"));
    assert!(!sql.contains("customers"));
}

#[test]
fn test_explicit_path_errors() {
    let options = CompileOptions::default();
    let base = || {
        Query::new()
            .with_dimension("orders.id")
            .with_dimension("customers.name")
    };

    let empty = Query {
        join_paths: Some(vec![]),
        ..base()
    };
    assert!(matches!(
        compile(&empty, &schemas(), &options),
        Err(CompileError::MissingJoinPath { .. })
    ));

    let undeclared = base().with_join_path(vec![JoinEdge::new("orders", "customers", "id")]);
    assert_eq!(
        compile(&undeclared, &schemas(), &options),
        Err(CompileError::JoinNotDeclared {
            left: "orders".into(),
            right: "customers".into(),
            on: "id".into(),
        })
    );

    let mismatch = base()
        .with_join_path(vec![JoinEdge::new("orders", "customers", "customer_id")])
        .with_join_path(vec![JoinEdge::start("customers")]);
    assert!(matches!(
        compile(&mismatch, &schemas(), &options),
        Err(CompileError::JoinPathStartMismatch { .. })
    ));
}

#[test]
fn test_graph_over_all_schemas() {
    let schemas = schemas();
    let refs: Vec<&TableSchema> = schemas.iter().collect();
    let graph = JoinGraph::build(&refs).unwrap();
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.edge("orders", "products", "product_id").is_some());
    assert!(graph.edge("products", "orders", "id").is_none());
}
