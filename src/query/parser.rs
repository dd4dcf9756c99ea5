//! Query DSL parser
//!
//! Parses JSON query DSL back into query AST nodes. Every fragment produced
//! by `QueryNode::finalize` parses into a query that finalizes to the same
//! fragment.

use crate::error::QueryError;
use crate::query::ast::Query;
use crate::query::nodes::{BoolQuery, LeafQuery, RangeQuery};
use crate::query::types::{ClauseKind, LeafKind, RangeOp, EXISTS_FIELD_KEY, SCRIPT_LANG};
use crate::Result;
use serde_json::{Map, Value};

/// Query parser for JSON DSL
pub struct QueryParser;

impl QueryParser {
    /// Parse a JSON query into an AST node
    ///
    /// # Example
    ///
    /// ```json
    /// {
    ///   "bool": {
    ///     "must": [
    ///       { "match": { "content": "rust" } }
    ///     ],
    ///     "filter": [
    ///       { "range": { "year": { "gte": 2024 } } }
    ///     ]
    ///   }
    /// }
    /// ```
    pub fn parse(json: &Value) -> Result<Query> {
        match json {
            Value::Object(map) => Self::parse_query_object(map),
            _ => Err(QueryError::InvalidRequest(
                "Query must be a JSON object".to_string(),
            )),
        }
    }

    /// Parse a JSON string into an AST node
    pub fn parse_str(json_str: &str) -> Result<Query> {
        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| QueryError::InvalidRequest(format!("Invalid JSON: {}", e)))?;
        Self::parse(&value)
    }

    /// Parse the query of a search request body
    ///
    /// Returns `None` when the body has no query or asks for `match_all`.
    pub fn parse_request(body: &Value) -> Result<Option<Query>> {
        let map = body.as_object().ok_or_else(|| {
            QueryError::InvalidRequest("Request body must be a JSON object".to_string())
        })?;
        match map.get("query") {
            None => Ok(None),
            Some(Value::Object(query)) if query.contains_key("match_all") => Ok(None),
            Some(query) => Self::parse(query).map(Some),
        }
    }

    fn parse_query_object(map: &Map<String, Value>) -> Result<Query> {
        // Handle wrapped query: { "query": { ... } }
        if let Some(query) = map.get("query") {
            return Self::parse(query);
        }

        let (key, body) = match (map.len(), map.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(QueryError::InvalidRequest(format!(
                    "Query object must have exactly one key. Got keys: {:?}",
                    map.keys().collect::<Vec<_>>()
                )))
            }
        };

        if key == "bool" {
            return Self::parse_bool(body);
        }
        if key == "range" {
            return Self::parse_range(body);
        }
        if let Some(kind) = LeafKind::from_key(key) {
            return Self::parse_leaf(kind, body).map(Query::from);
        }

        Err(QueryError::InvalidRequest(format!(
            "Unknown query type. Expected one of: bool, range, term, terms, regexp, wildcard, prefix, match, exists, script. Got: {}",
            key
        )))
    }

    /// Parse a bool query
    fn parse_bool(value: &Value) -> Result<Query> {
        let map = value.as_object().ok_or_else(|| {
            QueryError::InvalidRequest("bool query must be an object".to_string())
        })?;

        let mut builder = BoolQuery::builder();
        for (key, clauses) in map {
            if key == "boost" {
                builder = builder.boost(Self::parse_boost(clauses)?);
                continue;
            }
            let kind = ClauseKind::from_key(key).ok_or_else(|| {
                QueryError::InvalidRequest(format!("Unsupported bool parameter: {}", key))
            })?;
            builder = builder.clauses(kind, Self::parse_clause_array(clauses)?);
        }

        Ok(Query::from(builder.build()?))
    }

    /// Parse an array of query clauses
    fn parse_clause_array(value: &Value) -> Result<Vec<Query>> {
        match value {
            Value::Array(arr) => arr.iter().map(Self::parse).collect(),
            // Single clause can be provided without array wrapper
            obj @ Value::Object(_) => Ok(vec![Self::parse(obj)?]),
            _ => Err(QueryError::InvalidRequest(
                "Clause must be an array or object".to_string(),
            )),
        }
    }

    fn parse_boost(value: &Value) -> Result<f64> {
        value.as_f64().ok_or_else(|| {
            QueryError::InvalidRequest(format!("boost must be a number, got {}", value))
        })
    }

    fn parse_leaf(kind: LeafKind, value: &Value) -> Result<LeafQuery> {
        let map = value.as_object().ok_or_else(|| {
            QueryError::InvalidRequest(format!("{} query must be an object", kind))
        })?;

        match kind {
            LeafKind::Script => Self::parse_script(map),
            LeafKind::Terms | LeafKind::Exists => Self::parse_sibling_boost(kind, map),
            _ => Self::parse_single_field(kind, map),
        }
    }

    /// Parse `{field: value}` or `{field: {<value key>: value, boost}}`
    fn parse_single_field(kind: LeafKind, map: &Map<String, Value>) -> Result<LeafQuery> {
        let (field, spec) = match (map.len(), map.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(QueryError::InvalidRequest(format!(
                    "{} query must specify exactly one field",
                    kind
                )))
            }
        };

        let spec = match spec {
            Value::Object(spec) => spec,
            plain => return Ok(LeafQuery::new(kind, field.clone(), plain.clone())),
        };

        let value_key = kind.boosted_value_key().unwrap_or("value");
        let value = spec.get(value_key).ok_or_else(|| {
            QueryError::InvalidRequest(format!(
                "{} query spec must have '{}' field",
                kind, value_key
            ))
        })?;

        let mut query = LeafQuery::new(kind, field.clone(), value.clone());
        for (key, param) in spec {
            match key.as_str() {
                "boost" => query = query.with_boost(Self::parse_boost(param)?),
                key if key == value_key => {}
                other => {
                    return Err(QueryError::InvalidRequest(format!(
                        "Unsupported {} parameter: {}",
                        kind, other
                    )))
                }
            }
        }
        Ok(query)
    }

    /// Parse `{field: value, boost}` as used by `terms` and `exists`
    fn parse_sibling_boost(kind: LeafKind, map: &Map<String, Value>) -> Result<LeafQuery> {
        let boost = map.get("boost").map(Self::parse_boost).transpose()?;
        let mut entries = map.iter().filter(|(key, _)| key.as_str() != "boost");
        let (field, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(QueryError::InvalidRequest(format!(
                    "{} query must specify exactly one field",
                    kind
                )))
            }
        };

        let query = match kind {
            LeafKind::Exists => {
                if field != EXISTS_FIELD_KEY {
                    return Err(QueryError::InvalidRequest(format!(
                        "exists query expects '{}', got '{}'",
                        EXISTS_FIELD_KEY, field
                    )));
                }
                let name = value.as_str().ok_or_else(|| {
                    QueryError::InvalidRequest("exists field must be a string".to_string())
                })?;
                LeafQuery::exists(name)
            }
            _ => {
                if !value.is_array() {
                    return Err(QueryError::InvalidRequest(
                        "terms query values must be an array".to_string(),
                    ));
                }
                LeafQuery::new(kind, field.clone(), value.clone())
            }
        };

        Ok(match boost {
            Some(boost) => query.with_boost(boost),
            None => query,
        })
    }

    /// Parse `{script: {source, lang}, boost}`
    fn parse_script(map: &Map<String, Value>) -> Result<LeafQuery> {
        let script = map.get("script").ok_or_else(|| {
            QueryError::InvalidRequest("script query must have 'script' field".to_string())
        })?;

        let source = match script {
            Value::String(source) => source.as_str(),
            Value::Object(spec) => {
                if let Some(lang) = spec.get("lang") {
                    if lang.as_str() != Some(SCRIPT_LANG) {
                        return Err(QueryError::InvalidRequest(format!(
                            "Unsupported script language: {}",
                            lang
                        )));
                    }
                }
                spec.get("source").and_then(Value::as_str).ok_or_else(|| {
                    QueryError::InvalidRequest("script must have a string 'source'".to_string())
                })?
            }
            _ => {
                return Err(QueryError::InvalidRequest(
                    "script must be a string or object".to_string(),
                ))
            }
        };

        let query = LeafQuery::script(source);
        match map.get("boost") {
            Some(boost) => Ok(query.with_boost(Self::parse_boost(boost)?)),
            None => Ok(query),
        }
    }

    /// Parse a range query
    fn parse_range(value: &Value) -> Result<Query> {
        let map = value.as_object().ok_or_else(|| {
            QueryError::InvalidRequest("range query must be an object".to_string())
        })?;

        let (field, bounds) = match (map.len(), map.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(QueryError::InvalidRequest(
                    "range query must specify exactly one field".to_string(),
                ))
            }
        };

        let bounds = bounds.as_object().ok_or_else(|| {
            QueryError::InvalidRequest("range bounds must be an object".to_string())
        })?;

        let mut query = RangeQuery::new(field.clone());
        for (key, bound) in bounds {
            if key == "boost" {
                query = query.with_boost(Self::parse_boost(bound)?);
                continue;
            }
            let op = RangeOp::from_key(key).ok_or_else(|| {
                QueryError::InvalidRequest(format!("Unsupported range parameter: {}", key))
            })?;
            query = query.with_operator(op, bound.clone());
        }

        if query.is_empty() {
            return Err(QueryError::InvalidRequest(format!(
                "range query on '{}' has no bounds",
                field
            )));
        }

        Ok(Query::from(query))
    }
}
