//! Typed field and namespace accessors
//!
//! Accessors turn comparisons on a mapped field into query conditions,
//! rejecting operations the field's type cannot answer.

use super::field_type::FieldType;
use super::mapping::Schema;
use crate::error::QueryError;
use crate::query::nodes::{BoolQuery, LeafQuery, RangeQuery};
use crate::query::{ClauseKind, Query, RangeOp};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::ops::Not;

/// Format used for dates computed from ages
pub const AGE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Condition builder for one mapped field
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    path: String,
    field_type: FieldType,
    inverted: bool,
}

impl Field {
    pub fn new(path: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            path: path.into(),
            field_type,
            inverted: false,
        }
    }

    /// Full dot-path of the field
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Copy of this accessor whose conditions are negated
    pub fn invert(&self) -> Self {
        Self {
            inverted: !self.inverted,
            ..self.clone()
        }
    }

    fn invertible(&self, condition: impl Into<Query>) -> Query {
        let condition = condition.into();
        if self.inverted {
            BoolQuery::with_clause(ClauseKind::MustNot, vec![condition]).into()
        } else {
            condition
        }
    }

    pub fn eq(&self, value: impl Into<Value>) -> Query {
        self.invertible(LeafQuery::term(&self.path, value))
    }

    /// Inequality; on an inverted accessor this is the plain term
    pub fn ne(&self, value: impl Into<Value>) -> Query {
        let condition: Query = LeafQuery::term(&self.path, value).into();
        if self.inverted {
            condition
        } else {
            BoolQuery::with_clause(ClauseKind::MustNot, vec![condition]).into()
        }
    }

    pub fn isin<I, V>(&self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.invertible(LeafQuery::terms(&self.path, values))
    }

    pub fn exists(&self) -> Query {
        self.invertible(LeafQuery::exists(&self.path))
    }

    fn range(&self, op: RangeOp, value: Value) -> Result<Query> {
        if !self.field_type.supports_range() {
            return Err(self.unsupported(op.as_str()));
        }
        Ok(self.invertible(RangeQuery::new(&self.path).with_operator(op, value)))
    }

    pub fn lt(&self, value: impl Into<Value>) -> Result<Query> {
        self.range(RangeOp::Lt, value.into())
    }

    pub fn le(&self, value: impl Into<Value>) -> Result<Query> {
        self.range(RangeOp::Lte, value.into())
    }

    pub fn gt(&self, value: impl Into<Value>) -> Result<Query> {
        self.range(RangeOp::Gt, value.into())
    }

    pub fn ge(&self, value: impl Into<Value>) -> Result<Query> {
        self.range(RangeOp::Gte, value.into())
    }

    fn text(&self, operation: &str, condition: LeafQuery) -> Result<Query> {
        if !self.field_type.supports_text() {
            return Err(self.unsupported(operation));
        }
        Ok(self.invertible(condition))
    }

    /// Analyzed full-text match
    pub fn match_text(&self, text: impl Into<Value>) -> Result<Query> {
        self.text("match", LeafQuery::match_text(&self.path, text))
    }

    pub fn regexp(&self, pattern: &str) -> Result<Query> {
        self.text("regexp", LeafQuery::regexp(&self.path, pattern))
    }

    /// Substring match through a `*value*` wildcard
    pub fn contains(&self, value: &str) -> Result<Query> {
        self.text("contains", LeafQuery::wildcard(&self.path, format!("*{}*", value)))
    }

    pub fn startswith(&self, value: &str) -> Result<Query> {
        self.text("startswith", LeafQuery::prefix(&self.path, value))
    }

    pub fn endswith(&self, value: &str) -> Result<Query> {
        self.text("endswith", LeafQuery::wildcard(&self.path, format!("*{}", value)))
    }

    /// Comparisons in days before now, for date fields
    pub fn age(&self) -> Result<AgeField> {
        if self.field_type != FieldType::Date {
            return Err(self.unsupported("age"));
        }
        Ok(AgeField {
            field: self.clone(),
            reference: None,
        })
    }

    fn unsupported(&self, operation: &str) -> QueryError {
        QueryError::BadOperator(format!(
            "`{}` is not supported by {} field `{}`",
            operation, self.field_type, self.path
        ))
    }
}

impl Not for Field {
    type Output = Field;

    fn not(self) -> Field {
        self.invert()
    }
}

impl Not for &Field {
    type Output = Field;

    fn not(self) -> Field {
        self.invert()
    }
}

/// Date field compared by age in days
///
/// Directions flip: an age below `n` days is a date after `now - n`.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeField {
    field: Field,
    reference: Option<DateTime<Utc>>,
}

impl AgeField {
    /// Fix "now" instead of reading the clock on every comparison
    pub fn with_reference(mut self, now: DateTime<Utc>) -> Self {
        self.reference = Some(now);
        self
    }

    fn date(&self, days: f64) -> Value {
        let now = self.reference.unwrap_or_else(Utc::now);
        let delta = Duration::milliseconds((days * 86_400_000.0).round() as i64);
        Value::from((now - delta).format(AGE_DATE_FORMAT).to_string())
    }

    pub fn eq(&self, days: f64) -> Query {
        self.field.eq(self.date(days))
    }

    pub fn ne(&self, days: f64) -> Query {
        self.field.ne(self.date(days))
    }

    pub fn lt(&self, days: f64) -> Result<Query> {
        self.field.gt(self.date(days))
    }

    pub fn le(&self, days: f64) -> Result<Query> {
        self.field.ge(self.date(days))
    }

    pub fn gt(&self, days: f64) -> Result<Query> {
        self.field.lt(self.date(days))
    }

    pub fn ge(&self, days: f64) -> Result<Query> {
        self.field.le(self.date(days))
    }
}

/// Object property holding child fields
#[derive(Clone, Debug)]
pub struct Namespace<'a> {
    schema: &'a Schema,
    path: String,
    inverted: bool,
}

impl<'a> Namespace<'a> {
    pub(crate) fn new(schema: &'a Schema, path: impl Into<String>) -> Self {
        Self {
            schema,
            path: path.into(),
            inverted: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn child(&self, name: &str) -> String {
        format!("{}.{}", self.path, name)
    }

    pub fn field(&self, name: &str) -> Result<Field> {
        self.schema.field(&self.child(name))
    }

    pub fn namespace(&self, name: &str) -> Result<Namespace<'a>> {
        self.schema.namespace(&self.child(name))
    }

    /// Names of the fields directly inside this namespace
    pub fn fields(&self) -> Vec<&'a str> {
        self.schema.child_fields(&self.path)
    }

    pub fn namespaces(&self) -> Vec<&'a str> {
        self.schema.child_namespaces(&self.path)
    }

    pub fn invert(&self) -> Self {
        Self {
            inverted: !self.inverted,
            ..self.clone()
        }
    }

    pub fn exists(&self) -> Query {
        let condition: Query = LeafQuery::exists(&self.path).into();
        if self.inverted {
            BoolQuery::with_clause(ClauseKind::MustNot, vec![condition]).into()
        } else {
            condition
        }
    }
}
