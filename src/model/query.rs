//! The analytical query a caller compiles.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::filter::FilterNode;

/// A declarative query over one or more table schemas.
///
/// Every member reference has the form `table.member`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_filters",
        skip_serializing_if = "Option::is_none"
    )]
    pub filters: Option<FilterNode>,
    #[serde(
        default,
        deserialize_with = "deserialize_order",
        serialize_with = "serialize_order",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub order: Vec<OrderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_paths: Option<Vec<Vec<JoinEdge>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_params: Option<BTreeMap<String, String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measure(mut self, member: impl Into<String>) -> Self {
        self.measures.push(member.into());
        self
    }

    pub fn with_dimension(mut self, member: impl Into<String>) -> Self {
        self.dimensions.push(member.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<FilterNode>) -> Self {
        self.filters = Some(filter.into());
        self
    }

    pub fn with_order(mut self, member: impl Into<String>, direction: OrderDirection) -> Self {
        self.order.push(OrderEntry {
            member: member.into(),
            direction,
        });
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_join_path(mut self, path: Vec<JoinEdge>) -> Self {
        self.join_paths.get_or_insert_with(Vec::new).push(path);
        self
    }

    pub fn with_context_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// `["*"]` selects whole rows instead of aggregates.
    pub fn selects_all(&self) -> bool {
        self.measures.iter().any(|m| m == "*")
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub member: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// An edge of an explicit join path.
///
/// A path of one edge with no `right` just names the starting table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub left: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
}

impl JoinEdge {
    pub fn new(left: impl Into<String>, right: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: Some(right.into()),
            on: Some(on.into()),
        }
    }

    pub fn start(table: impl Into<String>) -> Self {
        Self {
            left: table.into(),
            right: None,
            on: None,
        }
    }
}

// =============================================================================
// Custom (de)serialization
// =============================================================================

/// `filters` is either a single node or a top-level list, which means AND.
fn deserialize_filters<'de, D>(deserializer: D) -> Result<Option<FilterNode>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Filters {
        List(Vec<FilterNode>),
        Node(FilterNode),
    }

    Ok(match Option::<Filters>::deserialize(deserializer)? {
        None => None,
        Some(Filters::List(children)) => Some(FilterNode::And { children }),
        Some(Filters::Node(node)) => Some(node),
    })
}

/// `order` is a JSON object whose key order is the sort priority.
fn deserialize_order<'de, D>(deserializer: D) -> Result<Vec<OrderEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderVisitor;

    impl<'de> Visitor<'de> for OrderVisitor {
        type Value = Vec<OrderEntry>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of member to \"asc\"/\"desc\", or a list of order entries")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((member, direction)) = map.next_entry::<String, OrderDirection>()? {
                entries.push(OrderEntry { member, direction });
            }
            Ok(entries)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::new();
            while let Some(entry) = seq.next_element::<OrderEntry>()? {
                entries.push(entry);
            }
            Ok(entries)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(OrderVisitor)
}

fn serialize_order<S>(order: &[OrderEntry], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(order.len()))?;
    for entry in order {
        map.serialize_entry(&entry.member, &entry.direction)?;
    }
    map.end()
}
