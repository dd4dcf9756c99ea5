//! Document store client
//!
//! The query layer only talks to a store through [`DocumentStore`]. An
//! in-memory implementation with the same request/response contract is
//! provided for tests, the CLI and offline evaluation.

mod aggregate;
mod analyzer;
mod memory;

pub use analyzer::Analyzer;
pub use memory::InMemoryStore;

use crate::models::{Document, Hit, SearchRequest, SearchResponse};
use crate::Result;
use serde_json::Value;

/// Request/response access to a search engine
pub trait DocumentStore: Send + Sync {
    /// Run a search request and return one page of hits
    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse>;

    /// Count documents matching the `query` of `body`
    fn count(&self, index: &str, body: &Value) -> Result<u64>;

    /// Fetch one document by id
    fn get(&self, index: &str, id: &str, source: Option<&[String]>) -> Result<Hit>;

    /// Iterate over every hit of a request, ignoring its `size`
    fn scan(&self, index: &str, request: &SearchRequest)
        -> Result<Box<dyn Iterator<Item = Hit> + Send>>;

    /// Raw mapping of an index, as returned by the store's mapping API
    fn get_mapping(&self, index: &str) -> Result<Value>;

    /// Names of every index, sorted
    fn list_indices(&self) -> Result<Vec<String>>;
}

/// Source of a hit with `_id`/`_score` attached on request
pub fn hit_to_document(hit: Hit, include_id: bool, include_score: bool) -> Document {
    let mut document = hit.source;
    if include_score {
        document.insert(
            "_score".to_string(),
            hit.score.map(Value::from).unwrap_or(Value::Null),
        );
    }
    if include_id {
        document.insert("_id".to_string(), Value::from(hit.id));
    }
    document
}
