//! Field type definitions
//!
//! Defines which conditions and aggregations each mapped data type supports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field data type
///
/// Collapses the store's mapping types into the families that behave the
/// same for querying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// integer, long, short, byte
    Integer,
    /// float, double, half_float
    Float,
    /// scaled_float
    Decimal,
    Boolean,
    /// keyword or text
    String,
    /// Date/time; supports ranges and ages relative to now
    Date,
    /// Any mapping type without dedicated support
    Dummy,
}

impl FieldType {
    /// Map a store mapping `type` to a field type
    pub fn from_mapping_type(mapping_type: &str) -> Self {
        match mapping_type {
            "integer" | "long" | "short" | "byte" => FieldType::Integer,
            "float" | "double" | "half_float" => FieldType::Float,
            "scaled_float" => FieldType::Decimal,
            "boolean" => FieldType::Boolean,
            "keyword" | "text" => FieldType::String,
            "date" => FieldType::Date,
            _ => FieldType::Dummy,
        }
    }

    /// Whether a mapping type holds child properties instead of values
    pub fn is_namespace_type(mapping_type: &str) -> bool {
        matches!(mapping_type, "object" | "nested")
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Dummy => "dummy",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Float | FieldType::Decimal
        )
    }

    /// Supports `<`, `<=`, `>`, `>=`
    pub fn supports_range(&self) -> bool {
        self.is_numeric() || *self == FieldType::Date
    }

    /// Supports `match`, `regexp`, `contains`, `startswith`, `endswith`
    pub fn supports_text(&self) -> bool {
        *self == FieldType::String
    }

    /// Supports `average`, `min`, `max` and `describe`
    pub fn supports_metrics(&self) -> bool {
        self.supports_range()
    }

    /// Supports `sum`
    pub fn supports_sum(&self) -> bool {
        self.is_numeric()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dtype())
    }
}
