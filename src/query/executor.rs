//! Query executor for evaluating queries against in-memory documents
//!
//! The executor walks a query tree and produces the set of matching document
//! numbers as a bitmap, following the document store's matching semantics.
//! Document numbers are positions in the slice handed to the executor.

use crate::client::Analyzer;
use crate::error::QueryError;
use crate::models::{resolve_values, Document};
use crate::query::ast::{Query, QueryNode};
use crate::query::nodes::{BoolQuery, LeafQuery, RangeQuery};
use crate::query::types::{LeafKind, RangeOp};
use crate::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use roaring::RoaringBitmap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Query executor over a slice of documents
pub struct QueryExecutor<'a> {
    documents: &'a [Document],
    analyzer: Analyzer,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(documents: &'a [Document]) -> Self {
        Self {
            documents,
            analyzer: Analyzer::default(),
        }
    }

    /// Use `analyzer` for `match` queries
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Every document number
    pub fn all_docs(&self) -> RoaringBitmap {
        (0..self.documents.len() as u32).collect()
    }

    /// Evaluate a query into the bitmap of matching documents
    pub fn execute(&self, query: &Query) -> Result<RoaringBitmap> {
        match query {
            Query::Leaf(leaf) => self.execute_leaf(leaf),
            Query::Range(range) => self.execute_range(range),
            Query::Bool(bool_query) => self.execute_bool(bool_query),
        }
    }

    fn execute_bool(&self, query: &BoolQuery) -> Result<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;

        // FILTER and MUST clauses: all required
        for clause in query.filter().iter().chain(query.must()) {
            let matches = self.execute(clause)?;
            let narrowed = match result {
                Some(r) => r & matches,
                None => matches,
            };
            if narrowed.is_empty() {
                return Ok(narrowed);
            }
            result = Some(narrowed);
        }

        // SHOULD clauses: at least one, only without must/filter
        if query.has_required_should() {
            let mut any = RoaringBitmap::new();
            for clause in query.should() {
                any |= self.execute(clause)?;
            }
            result = Some(match result {
                Some(r) => r & any,
                None => any,
            });
        }

        let mut result = result.unwrap_or_else(|| self.all_docs());
        for clause in query.must_not() {
            result -= self.execute(clause)?;
        }

        Ok(result)
    }

    fn execute_leaf(&self, leaf: &LeafQuery) -> Result<RoaringBitmap> {
        let matcher = LeafMatcher::compile(leaf, &self.analyzer)?;
        Ok(self.scan(|doc| matcher.matches(doc)))
    }

    fn execute_range(&self, range: &RangeQuery) -> Result<RoaringBitmap> {
        if range.is_empty() {
            return Err(QueryError::Validation(format!(
                "At least one operation must be called on the range query for `{}`",
                range.field()
            )));
        }
        let bounds: Vec<(RangeOp, &Value)> = range.operators().collect();
        Ok(self.scan(|doc| {
            resolve_values(doc, range.field()).into_iter().any(|value| {
                bounds.iter().all(|(op, bound)| {
                    compare_values(value, bound).map_or(false, |ordering| op.accepts(ordering))
                })
            })
        }))
    }

    fn scan(&self, predicate: impl Fn(&Document) -> bool) -> RoaringBitmap {
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| predicate(doc))
            .map(|(docno, _)| docno as u32)
            .collect()
    }

    /// Relevance score of each document in `matches`
    ///
    /// A leaf scores its boost (1.0 without one). A bool query scores the sum
    /// of its matching `must` and `should` children times its boost; `filter`
    /// and `must_not` clauses never score.
    pub fn score(&self, query: &Query, matches: &RoaringBitmap) -> Result<HashMap<u32, f64>> {
        let weight = query.boost_factor().unwrap_or(1.0);
        let bool_query = match query {
            Query::Bool(bool_query) => bool_query,
            _ => return Ok(matches.iter().map(|docno| (docno, weight)).collect()),
        };

        let mut totals: HashMap<u32, f64> = HashMap::new();
        for clause in bool_query.must().iter().chain(bool_query.should()) {
            let hits = self.execute(clause)? & matches;
            for (docno, score) in self.score(clause, &hits)? {
                *totals.entry(docno).or_insert(0.0) += score;
            }
        }

        Ok(matches
            .iter()
            .map(|docno| (docno, totals.get(&docno).copied().unwrap_or(0.0) * weight))
            .collect())
    }
}

/// Compiled form of a leaf query
enum LeafMatcher<'q> {
    Equals { field: &'q str, values: Vec<&'q Value> },
    Prefix { field: &'q str, prefix: &'q str },
    Pattern { field: &'q str, regex: Regex },
    Text { field: &'q str, terms: HashSet<String>, analyzer: &'q Analyzer },
    Exists { field: &'q str },
}

impl<'q> LeafMatcher<'q> {
    fn compile(leaf: &'q LeafQuery, analyzer: &'q Analyzer) -> Result<Self> {
        let field = leaf.field();
        let value = leaf.value();
        let matcher = match leaf.kind() {
            LeafKind::Term => LeafMatcher::Equals {
                field,
                values: vec![value],
            },
            LeafKind::Terms => LeafMatcher::Equals {
                field,
                values: value
                    .as_array()
                    .ok_or_else(|| {
                        QueryError::InvalidRequest("terms query values must be an array".to_string())
                    })?
                    .iter()
                    .collect(),
            },
            LeafKind::Prefix => LeafMatcher::Prefix {
                field,
                prefix: expect_str(leaf)?,
            },
            LeafKind::Wildcard => LeafMatcher::Pattern {
                field,
                regex: pattern_to_regex(expect_str(leaf)?)?,
            },
            LeafKind::Regexp => {
                let regex = Regex::new(&format!("^(?:{})$", expect_str(leaf)?)).map_err(|e| {
                    QueryError::InvalidRequest(format!("Invalid regexp pattern: {}", e))
                })?;
                LeafMatcher::Pattern { field, regex }
            }
            LeafKind::Match => LeafMatcher::Text {
                field,
                terms: analyzer.unique_terms(&value_text(value)),
                analyzer,
            },
            LeafKind::Exists => LeafMatcher::Exists {
                field: leaf.target_field().ok_or_else(|| {
                    QueryError::InvalidRequest("exists field must be a string".to_string())
                })?,
            },
            LeafKind::Script => {
                return Err(QueryError::InvalidRequest(
                    "script queries cannot be evaluated in memory".to_string(),
                ))
            }
        };
        Ok(matcher)
    }

    fn field(&self) -> &'q str {
        match self {
            LeafMatcher::Equals { field, .. }
            | LeafMatcher::Prefix { field, .. }
            | LeafMatcher::Pattern { field, .. }
            | LeafMatcher::Text { field, .. }
            | LeafMatcher::Exists { field } => *field,
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        let found = resolve_values(doc, self.field());
        match self {
            LeafMatcher::Equals { values, .. } => found
                .iter()
                .any(|doc_value| values.iter().any(|v| values_equal(doc_value, v))),
            LeafMatcher::Prefix { prefix, .. } => found
                .iter()
                .any(|v| v.as_str().map_or(false, |s| s.starts_with(prefix))),
            LeafMatcher::Pattern { regex, .. } => found
                .iter()
                .any(|v| v.as_str().map_or(false, |s| regex.is_match(s))),
            LeafMatcher::Text {
                terms, analyzer, ..
            } => found.iter().filter(|v| !v.is_null()).any(|v| {
                analyzer
                    .tokenize(&value_text(v))
                    .iter()
                    .any(|token| terms.contains(token))
            }),
            LeafMatcher::Exists { .. } => found.iter().any(|v| !v.is_null()),
        }
    }
}

fn expect_str(leaf: &LeafQuery) -> Result<&str> {
    leaf.value().as_str().ok_or_else(|| {
        QueryError::InvalidRequest(format!("{} query value must be a string", leaf.kind()))
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a `*`/`?` wildcard pattern to an anchored regex
pub(crate) fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 2);
    regex_pattern.push('^');

    for ch in pattern.chars() {
        match ch {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            _ => regex_pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4]))),
        }
    }

    regex_pattern.push('$');

    Regex::new(&regex_pattern)
        .map_err(|e| QueryError::InvalidRequest(format!("Invalid wildcard pattern: {}", e)))
}

/// Parse the date formats the store accepts for `date` fields
pub(crate) fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Order a document value against a query value
///
/// Numbers compare numerically (numeric strings included), strings that
/// both parse as dates compare chronologically, other strings
/// lexicographically. Mismatched kinds do not compare.
pub(crate) fn compare_values(doc_value: &Value, query_value: &Value) -> Option<Ordering> {
    match (doc_value, query_value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::String(a), Value::Number(b)) => a.parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (parse_date(a), parse_date(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(doc_value: &Value, query_value: &Value) -> bool {
    doc_value == query_value || compare_values(doc_value, query_value) == Some(Ordering::Equal)
}
