//! The async engine boundary with an in-memory engine.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use meerkat::compile::{CompileError, CompileOptions};
use meerkat::config::Settings;
use meerkat::engine::{execute_compiled, execute_sql, EngineError, EngineResult, QueryEngine, Rows};
use meerkat::model::{MemberDef, MemberType, Query, TableSchema};
use serde_json::json;

/// Answers canned rows for SQL containing a marker; fails otherwise.
struct CannedEngine {
    answers: HashMap<&'static str, Rows>,
    calls: Mutex<usize>,
}

impl CannedEngine {
    fn new() -> Self {
        let rows = vec![
            json!({"orders__customer_id": "6aa6", "orders__total": 0}),
            json!({"orders__customer_id": "1", "orders__total": 130}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        Self {
            answers: HashMap::from([("GROUP BY orders__customer_id", rows)]),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl QueryEngine for CannedEngine {
    async fn execute(&self, sql: &str) -> EngineResult<Rows> {
        *self.calls.lock().unwrap() += 1;
        self.answers
            .iter()
            .find(|(marker, _)| sql.contains(*marker))
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| EngineError::Execution(format!("no canned answer for:\n{}", sql)))
    }
}

/// Never answers.
struct StalledEngine;

#[async_trait]
impl QueryEngine for StalledEngine {
    async fn execute(&self, _sql: &str) -> EngineResult<Rows> {
        std::future::pending().await
    }
}

fn orders() -> TableSchema {
    TableSchema::new("orders", "select * from orders")
        .with_measure(MemberDef::new("total", "SUM(order_amount)", MemberType::Number))
        .with_dimension(MemberDef::new("customer_id", "customer_id", MemberType::String))
}

#[tokio::test]
async fn test_rows_come_back_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = CannedEngine::new();
    let query = Query::new()
        .with_measure("orders.total")
        .with_dimension("orders.customer_id");

    let rows = execute_compiled(
        &engine,
        &query,
        &[orders()],
        &CompileOptions::default(),
        Settings::default().engine.timeout(),
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["orders__customer_id"], json!("6aa6"));
    assert_eq!(rows[0]["orders__total"], json!(0));
    assert_eq!(*engine.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_engine_failure_propagates() {
    let engine = CannedEngine::new();
    let err = execute_sql(&engine, "SELECT 1", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Execution(_)));
}

#[tokio::test]
async fn test_compile_failure_is_wrapped() {
    let engine = CannedEngine::new();
    let query = Query::new().with_dimension("customers.name");
    let err = execute_compiled(
        &engine,
        &query,
        &[orders()],
        &CompileOptions::default(),
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Compile(CompileError::SchemaNotFound { ref table }) if table == "customers"
    ));
    assert_eq!(err.to_string(), "Schema not found: customers");
    assert_eq!(*engine.calls.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_engine_times_out() {
    let err = execute_sql(&StalledEngine, "SELECT 1", Duration::from_millis(250))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout(d) if d == Duration::from_millis(250)));
}
