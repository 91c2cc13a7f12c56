//! Member value types.

use serde::{Deserialize, Serialize};

/// Declared value type of a measure or dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Number,
    String,
    Time,
    Boolean,
    StringArray,
    NumberArray,
}

impl MemberType {
    /// Array-valued members get array-aware filter and projection rewrites.
    pub fn is_array(self) -> bool {
        matches!(self, MemberType::StringArray | MemberType::NumberArray)
    }

    /// Whether filter values for this type are emitted as numeric literals.
    pub fn is_numeric(self) -> bool {
        matches!(self, MemberType::Number | MemberType::NumberArray)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemberType::Number => "number",
            MemberType::String => "string",
            MemberType::Time => "time",
            MemberType::Boolean => "boolean",
            MemberType::StringArray => "string_array",
            MemberType::NumberArray => "number_array",
        }
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
