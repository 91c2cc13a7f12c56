//! The camelCase JSON shapes callers send.

use meerkat::model::{
    FilterNode, FilterOperator, MemberType, OrderDirection, Query, ResolutionConfig, TableSchema,
};

#[test]
fn test_full_query_payload() {
    let query: Query = serde_json::from_str(
        r#"{
            "measures": ["orders.total"],
            "dimensions": ["orders.status", "customers.name"],
            "filters": [
                {"or": [
                    {"member": "orders.status", "operator": "equals", "values": ["open", "held"]},
                    {"and": [
                        {"member": "orders.total", "operator": "gt", "values": [100]},
                        {"member": "orders.created_at", "operator": "inDateRange",
                         "values": ["2024-01-01", "2024-03-31"]}
                    ]}
                ]},
                {"member": "customers.id", "operator": "in", "sqlExpression": "SELECT id FROM vip"}
            ],
            "order": {"orders.total": "desc", "customers.name": "asc"},
            "limit": 100,
            "offset": 200,
            "joinPaths": [[{"left": "orders", "right": "customers", "on": "customer_id"}]],
            "contextParams": {"TENANT": "acme"}
        }"#,
    )
    .unwrap();

    let Some(FilterNode::And { children }) = &query.filters else {
        panic!("top-level filter list should be an AND");
    };
    assert_eq!(children.len(), 2);
    assert!(matches!(&children[0], FilterNode::Or { children } if children.len() == 2));

    let leaves = query.filters.as_ref().unwrap().leaves();
    assert_eq!(leaves.len(), 4);
    assert_eq!(leaves[1].values.as_deref(), Some(&["100".to_string()][..]));
    assert_eq!(leaves[2].operator, FilterOperator::InDateRange);
    assert_eq!(leaves[3].sql_expression.as_deref(), Some("SELECT id FROM vip"));

    let order: Vec<_> = query
        .order
        .iter()
        .map(|o| (o.member.as_str(), o.direction))
        .collect();
    assert_eq!(
        order,
        [
            ("orders.total", OrderDirection::Desc),
            ("customers.name", OrderDirection::Asc)
        ]
    );
    assert_eq!((query.limit, query.offset), (Some(100), Some(200)));
    assert_eq!(query.join_paths.as_ref().map(Vec::len), Some(1));
    assert_eq!(
        query.context_params.as_ref().and_then(|p| p.get("TENANT")).map(String::as_str),
        Some("acme")
    );
}

#[test]
fn test_schema_and_resolution_payload() {
    let config: ResolutionConfig = serde_json::from_str(
        r#"{
            "columnConfigs": [
                {"name": "orders.tag_ids", "isArrayType": true, "source": "tags",
                 "joinColumn": "id", "resolutionColumns": ["label"]}
            ],
            "tableSchemas": [
                {"name": "tags", "sql": "select * from tags",
                 "dimensions": [{"name": "label", "sql": "label", "type": "string", "alias": "Tag"}]}
            ]
        }"#,
    )
    .unwrap();
    assert!(config.column_configs[0].is_array_type);
    assert_eq!(config.table_schemas[0].dimension("label").unwrap().alias.as_deref(), Some("Tag"));

    let schema: TableSchema = serde_json::from_str(
        r#"{
            "name": "orders",
            "sql": "select * from orders",
            "dimensions": [{
                "name": "tag_ids", "sql": "tag_ids", "type": "string_array",
                "modifier": {"shouldUnnestGroupBy": true}
            }],
            "joins": [{"sql": "orders.customer_id = customers.id"}]
        }"#,
    )
    .unwrap();
    let tags = schema.dimension("tag_ids").unwrap();
    assert_eq!(tags.member_type, MemberType::StringArray);
    assert!(tags.should_unnest_group_by());
    assert!(!tags.should_flatten_array());
    assert_eq!(schema.joins.len(), 1);
}

#[test]
fn test_unknown_operator_rejected() {
    let result: Result<Query, _> = serde_json::from_str(
        r#"{"dimensions": ["orders.status"],
            "filters": [{"member": "orders.status", "operator": "startsWith", "values": ["a"]}]}"#,
    );
    assert!(result.is_err());
}
