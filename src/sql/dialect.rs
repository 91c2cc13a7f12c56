//! Target dialect.
//!
//! Generated SQL relies on DuckDB list semantics (`[..]` literals, `UNNEST`
//! in the select list, `* EXCLUDE`, aggregate `FILTER`), so DuckDB is the
//! only variant. Tokens consult the dialect when they become text.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    DuckDb,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::DuckDb => "duckdb",
        }
    }

    /// `"name"` with embedded double quotes doubled.
    pub fn quote_identifier(self, ident: &str) -> String {
        match self {
            Dialect::DuckDb => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    pub fn quote_string(self, value: &str) -> String {
        match self {
            Dialect::DuckDb => format!("'{}'", value.replace('\'', "''")),
        }
    }

    /// Uppercased function name, with common foreign spellings mapped onto
    /// the engine's own.
    pub fn function_name(self, name: &str) -> String {
        let upper = name.to_ascii_uppercase();
        let native = match (self, upper.as_str()) {
            (Dialect::DuckDb, "NVL" | "IFNULL" | "ISNULL") => "COALESCE",
            (Dialect::DuckDb, "LIST_AGG" | "ARRAY_AGGREGATE") => "ARRAY_AGG",
            (Dialect::DuckDb, "CARDINALITY" | "ARRAY_LENGTH") => "LEN",
            _ => return upper,
        };
        native.to_string()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
