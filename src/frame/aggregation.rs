//! Single-field aggregations over a frame's matches

use super::SearchFrame;
use crate::error::QueryError;
use crate::models::SearchRequest;
use crate::schema::{Field, FieldType};
use crate::Result;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Bucket key holding the counts of terms beyond the requested size
pub const OTHER_BUCKET: &str = "OTHER";

/// Term counts in descending order, `OTHER` last when present
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCounts {
    pub buckets: Vec<(Value, u64)>,
}

impl ValueCounts {
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|(_, count)| count).sum()
    }

    /// Relative frequencies of each bucket
    pub fn normalized(&self) -> Vec<(Value, f64)> {
        let total = self.total();
        self.buckets
            .iter()
            .map(|(key, count)| {
                let frequency = if total == 0 {
                    0.0
                } else {
                    *count as f64 / total as f64
                };
                (key.clone(), frequency)
            })
            .collect()
    }
}

/// Result of a metric aggregation; date fields report dates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Number(f64),
    Date(NaiveDateTime),
}

impl Metric {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Metric::Number(value) => Some(*value),
            Metric::Date(_) => None,
        }
    }

    fn from_value(value: &Value, field_type: FieldType) -> Option<Self> {
        let number = value.as_f64()?;
        match field_type {
            FieldType::Date => DateTime::from_timestamp_millis(number as i64)
                .map(|date| Metric::Date(date.naive_utc())),
            _ => Some(Metric::Number(number)),
        }
    }
}

impl SearchFrame {
    fn typed_field(&self, path: &str, operation: &str, check: fn(&FieldType) -> bool) -> Result<Field> {
        let field = self.field(path)?;
        if !check(&field.field_type()) {
            return Err(QueryError::BadOperator(format!(
                "`{}` is not supported by {} field `{}`",
                operation,
                field.field_type(),
                path
            )));
        }
        Ok(field)
    }

    /// Run one aggregation over the frame's matches, without hits
    fn simple_aggregation(&self, kind: &str, field: &Field, params: Map<String, Value>) -> Result<Value> {
        if self.limit.is_some() {
            warn!(index = %self.index, "limits are not applied in aggregations");
        }
        let mut spec = params;
        spec.insert("field".to_string(), Value::from(field.path()));

        let mut body = self.body()?;
        if let Value::Object(map) = &mut body {
            map.insert("aggs".to_string(), json!({ kind: { kind: spec } }));
        }
        let request = SearchRequest::new(body).with_size(0);
        let mut response = self.store.search(&self.index, &request)?;
        response.aggregations.remove(kind).ok_or_else(|| {
            QueryError::InvalidRequest(format!("store returned no `{}` aggregation", kind))
        })
    }

    fn metric(&self, kind: &str, path: &str) -> Result<Option<Metric>> {
        let field = self.typed_field(path, kind, FieldType::supports_metrics)?;
        let result = self.simple_aggregation(kind, &field, Map::new())?;
        Ok(result
            .get("value")
            .and_then(|value| Metric::from_value(value, field.field_type())))
    }

    /// Most frequent values of a field
    ///
    /// Counts can be approximate when there are more distinct values than `n`.
    pub fn value_counts(&self, path: &str, n: Option<usize>, missing: Option<Value>) -> Result<ValueCounts> {
        let field = self.field(path)?;
        let mut params = Map::new();
        params.insert(
            "size".to_string(),
            Value::from(n.unwrap_or(self.config.value_counts_size)),
        );
        if let Some(missing) = missing {
            params.insert("missing".to_string(), missing);
        }
        let result = self.simple_aggregation("terms", &field, params)?;

        let mut buckets: Vec<(Value, u64)> = result
            .get("buckets")
            .and_then(Value::as_array)
            .map(|buckets| {
                buckets
                    .iter()
                    .map(|bucket| {
                        let key = bucket.get("key").cloned().unwrap_or(Value::Null);
                        let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                        (key, count)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let error_bound = result
            .get("doc_count_error_upper_bound")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if let Some((_, smallest)) = buckets.last() {
            if error_bound > *smallest {
                warn!(
                    field = path,
                    error_bound, "value counts may omit terms; increase `n` for exact results"
                );
            }
        }

        let other = result
            .get("sum_other_doc_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if other > 0 {
            buckets.push((Value::from(OTHER_BUCKET), other));
        }
        Ok(ValueCounts { buckets })
    }

    /// Approximate count of distinct values
    pub fn nunique(&self, path: &str) -> Result<u64> {
        let field = self.field(path)?;
        let mut params = Map::new();
        params.insert(
            "precision_threshold".to_string(),
            Value::from(self.config.cardinality_precision),
        );
        let result = self.simple_aggregation("cardinality", &field, params)?;
        Ok(result.get("value").and_then(Value::as_u64).unwrap_or(0))
    }

    pub fn average(&self, path: &str) -> Result<Option<Metric>> {
        self.metric("avg", path)
    }

    pub fn min(&self, path: &str) -> Result<Option<Metric>> {
        self.metric("min", path)
    }

    pub fn max(&self, path: &str) -> Result<Option<Metric>> {
        self.metric("max", path)
    }

    pub fn sum(&self, path: &str, missing: Option<Value>) -> Result<f64> {
        let field = self.typed_field(path, "sum", FieldType::supports_sum)?;
        let mut params = Map::new();
        if let Some(missing) = missing {
            params.insert("missing".to_string(), missing);
        }
        let result = self.simple_aggregation("sum", &field, params)?;
        Ok(result.get("value").and_then(Value::as_f64).unwrap_or(0.0))
    }

    /// `count`, `min`, `max`, `avg` and `sum`; `extended` adds the variance family
    pub fn describe(&self, path: &str, extended: bool, missing: Option<Value>) -> Result<Map<String, Value>> {
        let field = self.typed_field(path, "describe", FieldType::supports_metrics)?;
        let kind = if extended { "extended_stats" } else { "stats" };
        let mut params = Map::new();
        if let Some(missing) = missing {
            params.insert("missing".to_string(), missing);
        }
        match self.simple_aggregation(kind, &field, params)? {
            Value::Object(stats) => Ok(stats),
            other => Err(QueryError::InvalidRequest(format!(
                "unexpected {} result: {}",
                kind, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryStore;
    use std::sync::Arc;

    fn frame() -> SearchFrame {
        let store = InMemoryStore::default();
        store
            .create_index(
                "sales",
                json!({"properties": {
                    "color": {"type": "keyword"},
                    "price": {"type": "float"},
                    "sold": {"type": "date"},
                    "paid": {"type": "boolean"}
                }}),
            )
            .unwrap();
        let docs = [
            json!({"color": "red", "price": 2.0, "sold": "2020-01-01T00:00:00Z"}),
            json!({"color": "red", "price": 4.0, "sold": "2020-01-03T00:00:00Z"}),
            json!({"color": "blue", "price": 6.0}),
            json!({"color": "green"}),
        ];
        store
            .bulk("sales", docs.into_iter().map(|d| d.as_object().cloned().unwrap()))
            .unwrap();
        SearchFrame::open(Arc::new(store), "sales").unwrap()
    }

    #[test]
    fn test_value_counts_with_other() {
        let counts = frame().value_counts("color", Some(1), None).unwrap();
        assert_eq!(
            counts.buckets,
            vec![(json!("red"), 2), (json!(OTHER_BUCKET), 2)]
        );
        let normalized = counts.normalized();
        assert_eq!(normalized[0].1, 0.5);
    }

    #[test]
    fn test_value_counts_respects_query() {
        let frame = frame();
        let cheap = frame.select(frame.field("price").unwrap().lt(5).unwrap()).unwrap();
        let counts = cheap.value_counts("color", None, None).unwrap();
        assert_eq!(counts.buckets, vec![(json!("red"), 2)]);
        assert_eq!(cheap.limit(1).nunique("color").unwrap(), 1);
    }

    #[test]
    fn test_numeric_metrics() {
        let frame = frame();
        assert_eq!(frame.average("price").unwrap(), Some(Metric::Number(4.0)));
        assert_eq!(frame.max("price").unwrap().and_then(|m| m.as_f64()), Some(6.0));
        assert_eq!(frame.sum("price", Some(json!(1))).unwrap(), 13.0);
        assert_eq!(frame.nunique("color").unwrap(), 3);
    }

    #[test]
    fn test_date_metrics() {
        let frame = frame();
        let expected = DateTime::from_timestamp_millis(1_577_923_200_000)
            .unwrap()
            .naive_utc();
        assert_eq!(frame.average("sold").unwrap(), Some(Metric::Date(expected)));
        assert!(matches!(frame.sum("sold", None), Err(QueryError::BadOperator(_))));
    }

    #[test]
    fn test_describe() {
        let frame = frame();
        let stats = frame.describe("price", false, None).unwrap();
        assert_eq!(stats["count"], json!(3));
        assert_eq!(stats["sum"], json!(12.0));
        assert!(stats.get("variance").is_none());

        let extended = frame.describe("price", true, None).unwrap();
        assert!(extended.contains_key("std_deviation"));
        assert!(matches!(
            frame.describe("paid", false, None),
            Err(QueryError::BadOperator(_))
        ));
    }
}
