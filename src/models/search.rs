use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::{Document, DocumentId};

/// Single search hit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Document,
}

impl Hit {
    pub fn new(id: impl Into<DocumentId>, source: Document) -> Self {
        Self {
            id: id.into(),
            score: None,
            source,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Search request against one index
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Request body: `query`, `aggs`, `track_scores`
    pub body: Value,
    /// Number of hits to return
    pub size: usize,
    /// Dot-paths of `_source` to return; all fields when `None`
    pub source: Option<Vec<String>>,
    /// Return hits in score order when scanning
    pub preserve_order: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            body: Value::Object(Map::new()),
            size: 10,
            source: None,
            preserve_order: false,
        }
    }
}

impl SearchRequest {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_source(mut self, fields: Option<Vec<String>>) -> Self {
        self.source = fields;
        self
    }

    pub fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }
}

/// Search response with timing information
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    pub total_hits: u64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub aggregations: Map<String, Value>,
    pub took_ms: u64,
}
