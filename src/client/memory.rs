use super::aggregate;
use super::{Analyzer, DocumentStore};
use crate::config::StoreConfig;
use crate::error::QueryError;
use crate::models::{select_fields, Document, DocumentId, Hit, SearchRequest, SearchResponse};
use crate::query::executor::QueryExecutor;
use crate::query::parser::QueryParser;
use crate::Result;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// One index: its mapping and documents in insertion order
#[derive(Debug, Default)]
struct IndexData {
    mapping: Value,
    ids: Vec<DocumentId>,
    sources: Vec<Document>,
    positions: HashMap<DocumentId, usize>,
    next_id: u64,
}

impl IndexData {
    /// Next sequence number not already taken by an explicit id
    fn generate_id(&mut self) -> DocumentId {
        loop {
            self.next_id += 1;
            let id = self.next_id.to_string();
            if !self.positions.contains_key(&id) {
                return id;
            }
        }
    }

    fn upsert(&mut self, id: DocumentId, source: Document) {
        match self.positions.get(&id) {
            Some(&position) => self.sources[position] = source,
            None => {
                self.positions.insert(id.clone(), self.ids.len());
                self.ids.push(id);
                self.sources.push(source);
            }
        }
    }

    fn hit(&self, docno: u32, score: Option<f64>, fields: Option<&[String]>) -> Hit {
        let position = docno as usize;
        let source = match fields {
            Some(fields) => select_fields(&self.sources[position], fields),
            None => self.sources[position].clone(),
        };
        Hit {
            id: self.ids[position].clone(),
            score,
            source,
        }
    }
}

/// Matching documents of one request, with scores in rank order
struct Evaluated {
    matches: RoaringBitmap,
    ranked: Vec<(u32, f64)>,
}

/// Document store that keeps every index in memory
///
/// Requests go through the same query parser and evaluation rules as a real
/// store would apply to the finalized wire format.
pub struct InMemoryStore {
    config: StoreConfig,
    analyzer: Analyzer,
    indices: RwLock<HashMap<String, IndexData>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl InMemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let analyzer = Analyzer::new(&config.analyzer);
        Self {
            config,
            analyzer,
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create an index with the given mapping (`{"properties": {...}}`)
    pub fn create_index(&self, index: &str, mapping: Value) -> Result<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(QueryError::InvalidRequest(format!(
                "Index already exists: {}",
                index
            )));
        }
        indices.insert(
            index.to_string(),
            IndexData {
                mapping,
                ..Default::default()
            },
        );
        info!(index, "created index");
        Ok(())
    }

    pub fn delete_index(&self, index: &str) -> Result<()> {
        self.indices
            .write()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| QueryError::IndexNotFound(index.to_string()))
    }

    /// Store a document, replacing any document with the same id
    ///
    /// Without an id the next unused sequence number is taken. Returns the id.
    pub fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        source: Document,
    ) -> Result<DocumentId> {
        let mut indices = self.indices.write();
        let data = indices
            .get_mut(index)
            .ok_or_else(|| QueryError::IndexNotFound(index.to_string()))?;
        let id = match id {
            Some(id) => id.to_string(),
            None => data.generate_id(),
        };
        data.upsert(id.clone(), source);
        Ok(id)
    }

    /// Store many documents with generated ids
    pub fn bulk<I>(&self, index: &str, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut indices = self.indices.write();
        let data = indices
            .get_mut(index)
            .ok_or_else(|| QueryError::IndexNotFound(index.to_string()))?;
        let mut count = 0;
        for source in documents {
            let id = data.generate_id();
            data.upsert(id, source);
            count += 1;
        }
        debug!(index, count, "bulk indexed documents");
        Ok(count)
    }

    fn evaluate(&self, data: &IndexData, body: &Value) -> Result<Evaluated> {
        let executor =
            QueryExecutor::new(&data.sources).with_analyzer(self.analyzer.clone());

        let (matches, scores) = match QueryParser::parse_request(body)? {
            Some(query) => {
                let matches = executor.execute(&query)?;
                let scores = executor.score(&query, &matches)?;
                (matches, scores)
            }
            None => {
                let matches = executor.all_docs();
                let scores = matches.iter().map(|docno| (docno, 1.0)).collect();
                (matches, scores)
            }
        };

        let mut ranked: Vec<(u32, f64)> = matches
            .iter()
            .map(|docno| (docno, scores.get(&docno).copied().unwrap_or(0.0)))
            .collect();
        // Stable: equal scores keep insertion order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(Evaluated { matches, ranked })
    }

    fn with_index<T>(&self, index: &str, f: impl FnOnce(&IndexData) -> Result<T>) -> Result<T> {
        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| QueryError::IndexNotFound(index.to_string()))?;
        f(data)
    }
}

fn track_scores(body: &Value) -> bool {
    body.get("track_scores")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

impl DocumentStore for InMemoryStore {
    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
        if request.size > self.config.max_result_window {
            return Err(QueryError::InvalidRequest(format!(
                "Result window is too large, size must be less than or equal to: [{}] but was [{}]",
                self.config.max_result_window, request.size
            )));
        }

        let start = Instant::now();
        self.with_index(index, |data| {
            let evaluated = self.evaluate(data, &request.body)?;

            let aggregations = match request.body.get("aggs") {
                Some(aggs) => {
                    let documents: Vec<&Document> = evaluated
                        .matches
                        .iter()
                        .map(|docno| &data.sources[docno as usize])
                        .collect();
                    aggregate::compute_all(aggs, &documents)?
                }
                None => Map::new(),
            };

            let scored = track_scores(&request.body);
            let hits = evaluated
                .ranked
                .iter()
                .take(request.size)
                .map(|&(docno, score)| {
                    data.hit(docno, scored.then_some(score), request.source.as_deref())
                })
                .collect();

            let response = SearchResponse {
                hits,
                total_hits: evaluated.matches.len(),
                aggregations,
                took_ms: start.elapsed().as_millis() as u64,
            };
            debug!(index, total_hits = response.total_hits, "search complete");
            Ok(response)
        })
    }

    fn count(&self, index: &str, body: &Value) -> Result<u64> {
        self.with_index(index, |data| Ok(self.evaluate(data, body)?.matches.len()))
    }

    fn get(&self, index: &str, id: &str, source: Option<&[String]>) -> Result<Hit> {
        self.with_index(index, |data| {
            let position = data
                .positions
                .get(id)
                .ok_or_else(|| QueryError::DocumentNotFound(id.to_string()))?;
            Ok(data.hit(*position as u32, None, source))
        })
    }

    fn scan(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Box<dyn Iterator<Item = Hit> + Send>> {
        let hits: Vec<Hit> = self.with_index(index, |data| {
            let evaluated = self.evaluate(data, &request.body)?;
            let scored = track_scores(&request.body);
            let order: Vec<(u32, f64)> = if request.preserve_order {
                evaluated.ranked
            } else {
                let scores: HashMap<u32, f64> = evaluated.ranked.into_iter().collect();
                evaluated
                    .matches
                    .iter()
                    .map(|docno| (docno, scores.get(&docno).copied().unwrap_or(0.0)))
                    .collect()
            };
            Ok(order
                .into_iter()
                .map(|(docno, score)| {
                    data.hit(docno, scored.then_some(score), request.source.as_deref())
                })
                .collect())
        })?;
        debug!(index, hits = hits.len(), "scan complete");
        Ok(Box::new(hits.into_iter()))
    }

    fn get_mapping(&self, index: &str) -> Result<Value> {
        self.with_index(index, |data| Ok(json!({ index: { "mappings": data.mapping } })))
    }

    fn list_indices(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.indices.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
