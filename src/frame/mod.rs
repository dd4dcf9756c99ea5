//! Index-scoped query sessions
//!
//! A [`SearchFrame`] pairs an index with an optional query and limit. Every
//! combinator returns a new frame; the original is never modified.
//!
//! # Example
//!
//! ```ignore
//! let frame = SearchFrame::open(store, "people")?;
//! let adults = frame.select(frame.field("age")?.ge(18)?)?;
//! let names = adults.take(10, Some(vec!["name".to_string()]))?;
//! ```

mod aggregation;
mod tabular;

pub use aggregation::{Metric, ValueCounts, OTHER_BUCKET};
pub use tabular::{columns, flatten_document, Row};

use crate::client::{hit_to_document, DocumentStore};
use crate::config::FrameConfig;
use crate::error::QueryError;
use crate::models::{Document, Hit, SearchRequest};
use crate::query::nodes::{BoolQuery, LeafQuery, RangeQuery};
use crate::query::{ClauseKind, Query, QueryNode};
use crate::schema::{Field, FieldType, Namespace, Schema};
use crate::Result;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;
use tracing::debug;

/// Argument to [`SearchFrame::select`] and [`SearchFrame::filter`]
#[derive(Debug, Clone)]
pub enum Operand {
    Query(Query),
    Frame(SearchFrame),
    Literal(Value),
}

impl From<Query> for Operand {
    fn from(query: Query) -> Self {
        Operand::Query(query)
    }
}

impl From<LeafQuery> for Operand {
    fn from(query: LeafQuery) -> Self {
        Operand::Query(query.into())
    }
}

impl From<RangeQuery> for Operand {
    fn from(query: RangeQuery) -> Self {
        Operand::Query(query.into())
    }
}

impl From<BoolQuery> for Operand {
    fn from(query: BoolQuery) -> Self {
        Operand::Query(query.into())
    }
}

impl From<SearchFrame> for Operand {
    fn from(frame: SearchFrame) -> Self {
        Operand::Frame(frame)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl Operand {
    fn into_query(self) -> Result<Query> {
        match self {
            Operand::Query(query) => Ok(query),
            Operand::Frame(frame) => Err(QueryError::BadOperator(format!(
                "frame over `{}` cannot be used as a condition",
                frame.index
            ))),
            Operand::Literal(value) => Err(QueryError::BadOperator(value.to_string())),
        }
    }
}

/// Options for [`SearchFrame::collect`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectOptions {
    /// Dot-paths of `_source` to return; every field when `None`
    pub fields: Option<Vec<String>>,
    /// Overrides the frame's limit; results are score ordered when set
    pub limit: Option<usize>,
    /// Keep score order when scanning without a limit
    pub preserve_order: bool,
    pub include_score: bool,
    pub include_id: bool,
}

impl CollectOptions {
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    pub fn with_score(mut self) -> Self {
        self.include_score = true;
        self
    }

    pub fn with_id(mut self) -> Self {
        self.include_id = true;
        self
    }
}

/// Query session over one index
#[derive(Clone)]
pub struct SearchFrame {
    store: Arc<dyn DocumentStore>,
    index: String,
    schema: Arc<Schema>,
    config: FrameConfig,
    query: Option<Query>,
    limit: Option<usize>,
}

impl fmt::Debug for SearchFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchFrame")
            .field("index", &self.index)
            .field("query", &self.query)
            .field("limit", &self.limit)
            .finish()
    }
}

impl SearchFrame {
    /// Open a frame over `index`, reading its schema from the store
    pub fn open(store: Arc<dyn DocumentStore>, index: &str) -> Result<Self> {
        let mapping = store.get_mapping(index)?;
        let schema = Schema::from_mapping(index, &mapping)?;
        debug!(index, fields = schema.dtypes().len(), "opened frame");
        Ok(Self {
            store,
            index: index.to_string(),
            schema: Arc::new(schema),
            config: FrameConfig::default(),
            query: None,
            limit: None,
        })
    }

    /// Indices a frame could be opened on
    pub fn list_indices(store: &dyn DocumentStore) -> Result<Vec<String>> {
        store.list_indices()
    }

    pub fn with_config(mut self, config: FrameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn field(&self, path: &str) -> Result<Field> {
        self.schema.field(path)
    }

    pub fn namespace(&self, path: &str) -> Result<Namespace<'_>> {
        self.schema.namespace(path)
    }

    /// Root-level field names
    pub fn fields(&self) -> Vec<&str> {
        self.schema.fields()
    }

    /// Root-level namespace names
    pub fn namespaces(&self) -> Vec<&str> {
        self.schema.namespaces()
    }

    pub fn dtypes(&self) -> &BTreeMap<String, FieldType> {
        self.schema.dtypes()
    }

    fn with_query(&self, query: Option<Query>) -> Self {
        Self {
            query,
            ..self.clone()
        }
    }

    /// Narrow the frame with a condition
    pub fn select(&self, operand: impl Into<Operand>) -> Result<Self> {
        let condition = operand.into().into_query()?;
        Ok(self.with_query(Some(Query::combine_and(self.query.clone(), condition))))
    }

    /// Narrow the frame with non-scoring `filter` clauses
    pub fn filter<I>(&self, operands: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let conditions = operands
            .into_iter()
            .map(|operand| operand.into().into_query())
            .collect::<Result<Vec<_>>>()?;
        if conditions.is_empty() {
            return Ok(self.clone());
        }
        let filter: Query = BoolQuery::with_clause(ClauseKind::Filter, conditions).into();
        Ok(self.with_query(Some(Query::combine_and(self.query.clone(), filter))))
    }

    /// Documents matching both frames
    pub fn and(&self, other: &SearchFrame) -> Self {
        self.with_query(Query::and_option(self.query.as_ref(), other.query.as_ref()))
    }

    /// Documents matching either frame
    pub fn or(&self, other: &SearchFrame) -> Self {
        self.with_query(Query::or_option(self.query.as_ref(), other.query.as_ref()))
    }

    /// Documents not matching the frame's query
    pub fn negate(&self) -> Result<Self> {
        let negated = Query::negate_option(self.query.as_ref())?;
        Ok(self.with_query(Some(negated)))
    }

    pub fn limit(&self, n: usize) -> Self {
        Self {
            limit: Some(n),
            ..self.clone()
        }
    }

    /// Request body for the frame's query
    pub fn body(&self) -> Result<Value> {
        match &self.query {
            Some(query) => Ok(json!({ "query": query.finalize()? })),
            None => Ok(json!({ "query": { "match_all": {} } })),
        }
    }

    /// Send `body` to the store
    ///
    /// With a `size` this is one search page in score order; without one every
    /// match is scanned, in score order only when `preserve_order` is set.
    pub fn execute(
        &self,
        body: Value,
        size: Option<usize>,
        fields: Option<Vec<String>>,
        preserve_order: bool,
    ) -> Result<Vec<Hit>> {
        match size {
            Some(size) => {
                let request = SearchRequest::new(body).with_size(size).with_source(fields);
                Ok(self.store.search(&self.index, &request)?.hits)
            }
            None => {
                let request = SearchRequest::new(body)
                    .with_source(fields)
                    .with_preserve_order(preserve_order);
                Ok(self.store.scan(&self.index, &request)?.collect())
            }
        }
    }

    /// Matching documents' sources
    pub fn collect(&self, options: CollectOptions) -> Result<Vec<Document>> {
        let size = options.limit.or(self.limit);
        let mut body = self.body()?;
        if let Value::Object(map) = &mut body {
            map.insert("track_scores".to_string(), Value::from(options.include_score));
        }
        let preserve_order = options.preserve_order || self.config.preserve_order;
        let hits = self.execute(body, size, options.fields, preserve_order)?;
        Ok(hits
            .into_iter()
            .map(|hit| hit_to_document(hit, options.include_id, options.include_score))
            .collect())
    }

    pub fn count(&self) -> Result<u64> {
        self.store.count(&self.index, &self.body()?)
    }

    /// First `n` matching documents in score order
    pub fn take(&self, n: usize, fields: Option<Vec<String>>) -> Result<Vec<Document>> {
        let mut options = CollectOptions::default().with_limit(n);
        options.fields = fields;
        self.collect(options)
    }

    /// Source of the document with `id`, regardless of the frame's query
    pub fn get(&self, id: &str, fields: Option<&[String]>) -> Result<Document> {
        Ok(self.store.get(&self.index, id, fields)?.source)
    }

    /// Matching documents flattened to dot-path rows
    pub fn to_rows(&self, fields: Option<Vec<String>>) -> Result<Vec<Row>> {
        let mut options = CollectOptions::default();
        options.fields = fields;
        Ok(self.collect(options)?.iter().map(flatten_document).collect())
    }

    /// First rows of the frame for display
    pub fn preview(&self) -> Result<Vec<Row>> {
        let options = CollectOptions::default().with_limit(self.config.preview_rows);
        Ok(self.collect(options)?.iter().map(flatten_document).collect())
    }
}

impl BitAnd for &SearchFrame {
    type Output = SearchFrame;

    fn bitand(self, rhs: &SearchFrame) -> SearchFrame {
        self.and(rhs)
    }
}

impl BitOr for &SearchFrame {
    type Output = SearchFrame;

    fn bitor(self, rhs: &SearchFrame) -> SearchFrame {
        self.or(rhs)
    }
}
