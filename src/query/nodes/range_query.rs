//! Range query - matches documents with field values in a range

use crate::error::QueryError;
use crate::query::ast::{Boostable, QueryNode, WireFragment};
use crate::query::nodes::leaf_query::object1;
use crate::query::types::RangeOp;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Query that matches documents with field values within a range
///
/// Bounds are added with the copy-on-write builders; each returns a new
/// query and leaves the receiver untouched, so a partially built range can
/// be reused as a template. Works with numbers, dates and strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    field: String,
    operators: BTreeMap<RangeOp, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boost: Option<f64>,
}

impl RangeQuery {
    /// Create a new range query with no bounds yet
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operators: BTreeMap::new(),
            boost: None,
        }
    }

    /// Return a copy with `op` bound to `value`, replacing any earlier bound
    pub fn with_operator(&self, op: RangeOp, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.operators.insert(op, value.into());
        next
    }

    pub fn greater_than(&self, value: impl Into<Value>) -> Self {
        self.with_operator(RangeOp::Gt, value)
    }

    pub fn greater_than_or_equal(&self, value: impl Into<Value>) -> Self {
        self.with_operator(RangeOp::Gte, value)
    }

    pub fn less_than(&self, value: impl Into<Value>) -> Self {
        self.with_operator(RangeOp::Lt, value)
    }

    pub fn less_than_or_equal(&self, value: impl Into<Value>) -> Self {
        self.with_operator(RangeOp::Lte, value)
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Bounds in wire order
    pub fn operators(&self) -> impl Iterator<Item = (RangeOp, &Value)> {
        self.operators.iter().map(|(op, value)| (*op, value))
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Check if this is a point query (gte == lte)
    pub fn is_point_query(&self) -> bool {
        match (
            self.operators.get(&RangeOp::Gte),
            self.operators.get(&RangeOp::Lte),
        ) {
            (Some(gte), Some(lte)) => gte == lte,
            _ => false,
        }
    }
}

impl QueryNode for RangeQuery {
    fn finalize(&self) -> Result<WireFragment> {
        if self.operators.is_empty() {
            return Err(QueryError::Validation(format!(
                "At least one operation must be called on the range query for `{}`",
                self.field
            )));
        }

        let mut bounds: Map<String, Value> = self
            .operators
            .iter()
            .map(|(op, value)| (op.as_str().to_string(), value.clone()))
            .collect();
        if let Some(boost) = self.boost {
            bounds.insert("boost".to_string(), Value::from(boost));
        }

        Ok(object1("range", object1(&self.field, Value::Object(bounds))))
    }

    fn query_type(&self) -> &'static str {
        "range"
    }

    fn boost_factor(&self) -> Option<f64> {
        self.boost
    }
}

impl Boostable for RangeQuery {
    fn boost(&self, value: f64) -> Self {
        self.clone().with_boost(value)
    }
}
