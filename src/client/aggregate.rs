//! Aggregations evaluated by the in-memory store

use crate::error::QueryError;
use crate::models::{resolve_values, Document};
use crate::query::executor::parse_date;
use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

const DEFAULT_TERMS_SIZE: usize = 10;

/// Evaluate an `aggs` request object over the matching documents
pub(crate) fn compute_all(aggs: &Value, documents: &[&Document]) -> Result<Map<String, Value>> {
    let aggs = aggs
        .as_object()
        .ok_or_else(|| QueryError::InvalidRequest("aggs must be an object".to_string()))?;

    let mut results = Map::new();
    for (name, spec) in aggs {
        let (kind, params) = spec
            .as_object()
            .and_then(|spec| spec.iter().next())
            .ok_or_else(|| {
                QueryError::InvalidRequest(format!("aggregation `{}` has no type", name))
            })?;
        results.insert(name.clone(), compute(kind, params, documents)?);
    }
    Ok(results)
}

fn compute(kind: &str, params: &Value, documents: &[&Document]) -> Result<Value> {
    let field = params.get("field").and_then(Value::as_str).ok_or_else(|| {
        QueryError::InvalidRequest(format!("{} aggregation requires a field", kind))
    })?;
    let missing = params.get("missing");

    let per_doc: Vec<Vec<&Value>> = documents
        .iter()
        .map(|doc| {
            let values: Vec<&Value> = resolve_values(doc, field)
                .into_iter()
                .filter(|v| !v.is_null())
                .collect();
            if values.is_empty() {
                missing.into_iter().collect()
            } else {
                values
            }
        })
        .collect();

    match kind {
        "terms" => {
            let size = params
                .get("size")
                .and_then(Value::as_u64)
                .map_or(DEFAULT_TERMS_SIZE, |s| s as usize);
            Ok(terms(&per_doc, size))
        }
        "cardinality" => {
            let distinct: HashSet<String> = per_doc
                .iter()
                .flatten()
                .map(|v| v.to_string())
                .collect();
            Ok(json!({ "value": distinct.len() }))
        }
        "avg" | "min" | "max" | "sum" | "stats" | "extended_stats" => {
            let stats = Stats::collect(per_doc.iter().flatten().filter_map(|v| numeric(v)));
            Ok(stats.render(kind))
        }
        other => Err(QueryError::InvalidRequest(format!(
            "Unsupported aggregation: {}",
            other
        ))),
    }
}

fn terms(per_doc: &[Vec<&Value>], size: usize) -> Value {
    let mut counts: HashMap<String, (Value, u64)> = HashMap::new();
    for values in per_doc {
        let mut seen = HashSet::new();
        for value in values {
            let key = value.to_string();
            if seen.insert(key.clone()) {
                counts
                    .entry(key)
                    .or_insert_with(|| ((*value).clone(), 0))
                    .1 += 1;
            }
        }
    }

    let mut buckets: Vec<(String, Value, u64)> = counts
        .into_iter()
        .map(|(key, (value, count))| (key, value, count))
        .collect();
    buckets.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    let other: u64 = buckets.iter().skip(size).map(|(_, _, count)| count).sum();
    let rendered: Vec<Value> = buckets
        .into_iter()
        .take(size)
        .map(|(_, key, count)| json!({"key": key, "doc_count": count}))
        .collect();

    json!({
        "doc_count_error_upper_bound": 0,
        "sum_other_doc_count": other,
        "buckets": rendered,
    })
}

/// Numeric view of a value; dates become epoch milliseconds
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.parse::<f64>().ok().or_else(|| {
            parse_date(s).map(|dt| dt.and_utc().timestamp_millis() as f64)
        }),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Stats {
    count: u64,
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    sum_of_squares: f64,
}

impl Stats {
    fn collect(values: impl Iterator<Item = f64>) -> Self {
        let mut stats = Stats::default();
        for value in values {
            stats.count += 1;
            stats.sum += value;
            stats.sum_of_squares += value * value;
            stats.min = Some(stats.min.map_or(value, |m| m.min(value)));
            stats.max = Some(stats.max.map_or(value, |m| m.max(value)));
        }
        stats
    }

    fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn render(&self, kind: &str) -> Value {
        match kind {
            "avg" => json!({ "value": self.avg() }),
            "min" => json!({ "value": self.min }),
            "max" => json!({ "value": self.max }),
            "sum" => json!({ "value": self.sum }),
            "stats" => self.render_stats(),
            _ => {
                let mut extended = self.render_stats();
                let variance = self.avg().map(|avg| self.sum_of_squares / self.count as f64 - avg * avg);
                if let Value::Object(map) = &mut extended {
                    map.insert("sum_of_squares".to_string(), json!(self.sum_of_squares));
                    map.insert("variance".to_string(), json!(variance));
                    map.insert(
                        "std_deviation".to_string(),
                        json!(variance.map(|v| v.max(0.0).sqrt())),
                    );
                }
                extended
            }
        }
    }

    fn render_stats(&self) -> Value {
        json!({
            "count": self.count,
            "min": self.min,
            "max": self.max,
            "avg": self.avg(),
            "sum": self.sum,
        })
    }
}
