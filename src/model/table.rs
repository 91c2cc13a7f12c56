//! Table schemas: the named cubes a query is written against.

use serde::{Deserialize, Serialize};

use super::types::MemberType;

/// A named logical table exposing measures and dimensions as SQL expressions.
///
/// `sql` is the source the table reads from. It may contain
/// `${CONTEXT_PARAMS.KEY}` placeholders that are filled in per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub sql: String,
    #[serde(default)]
    pub measures: Vec<MemberDef>,
    #[serde(default)]
    pub dimensions: Vec<MemberDef>,
    /// Join predicates declared by this table, e.g. `orders.customer_id = customers.id`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<TableJoin>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            measures: vec![],
            dimensions: vec![],
            joins: vec![],
        }
    }

    pub fn with_measure(mut self, measure: MemberDef) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn with_dimension(mut self, dimension: MemberDef) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_join(mut self, sql: impl Into<String>) -> Self {
        self.joins.push(TableJoin { sql: sql.into() });
        self
    }

    pub fn measure(&self, name: &str) -> Option<&MemberDef> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&MemberDef> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

/// A join predicate attached to a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableJoin {
    pub sql: String,
}

/// A measure or dimension declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDef {
    pub name: String,
    pub sql: String,
    #[serde(rename = "type")]
    pub member_type: MemberType,
    /// Human label used as the output column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<MemberModifier>,
}

impl MemberDef {
    pub fn new(name: impl Into<String>, sql: impl Into<String>, member_type: MemberType) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            member_type,
            alias: None,
            modifier: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_modifier(mut self, modifier: MemberModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn should_unnest_group_by(&self) -> bool {
        self.modifier.is_some_and(|m| m.should_unnest_group_by)
    }

    pub fn should_flatten_array(&self) -> bool {
        self.modifier.is_some_and(|m| m.should_flatten_array)
    }
}

/// Projection rewrites for array-typed dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberModifier {
    /// Group per element instead of per whole array.
    pub should_unnest_group_by: bool,
    /// Emit one row per element, keeping a NULL row for null or empty arrays.
    pub should_flatten_array: bool,
}

impl MemberModifier {
    pub fn unnest_group_by() -> Self {
        Self {
            should_unnest_group_by: true,
            ..Self::default()
        }
    }

    pub fn flatten_array() -> Self {
        Self {
            should_flatten_array: true,
            ..Self::default()
        }
    }
}
