//! Lookup configuration for the resolution pipeline.

use serde::{Deserialize, Serialize};

use super::table::TableSchema;

/// Which output columns get expanded into lookup values, and where the
/// lookup tables live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionConfig {
    #[serde(default)]
    pub column_configs: Vec<ColumnResolutionConfig>,
    #[serde(default)]
    pub table_schemas: Vec<TableSchema>,
}

impl ResolutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, config: ColumnResolutionConfig) -> Self {
        self.column_configs.push(config);
        self
    }

    pub fn with_table_schema(mut self, schema: TableSchema) -> Self {
        self.table_schemas.push(schema);
        self
    }
}

/// A single column to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnResolutionConfig {
    /// Member reference of the column in the base query (`table.member`).
    pub name: String,
    #[serde(default)]
    pub is_array_type: bool,
    /// Name of the lookup schema in [`ResolutionConfig::table_schemas`].
    pub source: String,
    /// Dimension of the lookup schema the base value is matched against.
    pub join_column: String,
    /// Dimensions of the lookup schema to project.
    pub resolution_columns: Vec<String>,
}

impl ColumnResolutionConfig {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            is_array_type: false,
            source: source.into(),
            join_column: join_column.into(),
            resolution_columns: vec![],
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array_type = true;
        self
    }

    pub fn with_resolution_column(mut self, column: impl Into<String>) -> Self {
        self.resolution_columns.push(column.into());
        self
    }
}
