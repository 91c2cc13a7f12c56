//! Parse-back check for generated SQL.

use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use super::Dialect;

/// Parse `sql` with the grammar of `dialect`, reporting the text on failure.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parsed = match dialect {
        Dialect::DuckDb => Parser::parse_sql(&DuckDbDialect {}, sql),
    };
    match parsed {
        Ok(statements) if statements.len() == 1 => Ok(()),
        Ok(statements) => Err(format!("expected one statement, got {}:\n{}", statements.len(), sql)),
        Err(e) => Err(format!("{} rejected generated SQL: {}\n{}", dialect, e, sql)),
    }
}

#[test]
fn test_rejects_garbage() {
    assert!(validate_sql("SELEC * FORM orders", Dialect::DuckDb).is_err());
    assert!(validate_sql("SELECT 1; SELECT 2", Dialect::DuckDb).is_err());
    validate_sql("SELECT * FROM (select 1) AS t", Dialect::DuckDb).unwrap();
}
