//! Boolean filter trees.
//!
//! Callers send filters as JSON objects of three shapes: `{"and": [..]}`,
//! `{"or": [..]}` and a leaf `{"member", "operator", "values"}`. They are
//! read into the closed [`FilterNode`] sum type.

use serde::{Deserialize, Deserializer, Serialize};

/// A node of a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    And {
        #[serde(rename = "and")]
        children: Vec<FilterNode>,
    },
    Or {
        #[serde(rename = "or")]
        children: Vec<FilterNode>,
    },
    Leaf(FilterLeaf),
}

impl FilterNode {
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::And { children }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Or { children }
    }

    pub fn leaf(leaf: FilterLeaf) -> Self {
        FilterNode::Leaf(leaf)
    }

    /// Visit every leaf in document order.
    pub fn leaves(&self) -> Vec<&FilterLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    /// The subtree of leaves on `member`. Groups left empty are dropped.
    pub fn retain_member(&self, member: &str) -> Option<FilterNode> {
        let retain = |children: &[FilterNode]| -> Option<Vec<FilterNode>> {
            let kept: Vec<FilterNode> = children
                .iter()
                .filter_map(|child| child.retain_member(member))
                .collect();
            (!kept.is_empty()).then_some(kept)
        };
        match self {
            FilterNode::And { children } => retain(children.as_slice()).map(FilterNode::and),
            FilterNode::Or { children } => retain(children.as_slice()).map(FilterNode::or),
            FilterNode::Leaf(leaf) => (leaf.member == member).then(|| self.clone()),
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a FilterLeaf>) {
        match self {
            FilterNode::And { children } | FilterNode::Or { children } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            FilterNode::Leaf(leaf) => out.push(leaf),
        }
    }
}

impl From<FilterLeaf> for FilterNode {
    fn from(leaf: FilterLeaf) -> Self {
        FilterNode::Leaf(leaf)
    }
}

/// A single predicate on one member.
///
/// At most one of `values`, `sql` and `sql_expression` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLeaf {
    pub member: String,
    pub operator: FilterOperator,
    #[serde(
        default,
        deserialize_with = "deserialize_values",
        skip_serializing_if = "Option::is_none"
    )]
    pub values: Option<Vec<String>>,
    /// Raw predicate template; `{member}` is replaced with the member's column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Raw SQL placed inside `IN (...)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_expression: Option<String>,
}

impl FilterLeaf {
    pub fn new(member: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            member: member.into(),
            operator,
            values: None,
            sql: None,
            sql_expression: None,
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_sql_expression(mut self, sql: impl Into<String>) -> Self {
        self.sql_expression = Some(sql.into());
        self
    }
}

/// Filter values arrive as JSON strings, numbers or booleans; all are kept as text.
fn deserialize_values<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    raw.map(|values| {
        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => Ok(s),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                serde_json::Value::Bool(b) => Ok(b.to_string()),
                other => Err(serde::de::Error::custom(format!(
                    "filter value must be a string, number or boolean, got {}",
                    other
                ))),
            })
            .collect()
    })
    .transpose()
}

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    InDateRange,
    NotInDateRange,
    Set,
    NotSet,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::InDateRange => "inDateRange",
            FilterOperator::NotInDateRange => "notInDateRange",
            FilterOperator::Set => "set",
            FilterOperator::NotSet => "notSet",
        }
    }

    /// Operators that read `values`.
    pub fn takes_values(self) -> bool {
        !matches!(self, FilterOperator::Set | FilterOperator::NotSet)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
