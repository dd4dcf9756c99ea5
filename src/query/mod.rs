//! Boolean query algebra
//!
//! Conditions are immutable trees that combine with `&`, `|`, `!` and `+`
//! and finalize into the Elasticsearch query DSL:
//! - Leaf conditions (term, terms, regexp, wildcard, prefix, match, exists, script)
//! - Range conditions (gt, gte, lt, lte)
//! - Boolean conditions (must, filter, should, must_not)
//!
//! # Example
//!
//! ```json
//! {
//!   "bool": {
//!     "must": [
//!       { "term": { "ns1.attr1": 1 } }
//!     ],
//!     "must_not": [
//!       { "range": { "created_at": { "lt": "2024-01-01" } } }
//!     ]
//!   }
//! }
//! ```

pub mod ast;
pub mod executor;
pub mod nodes;
pub mod parser;
pub mod types;

pub use ast::{boost, Boostable, Query, QueryNode, WireFragment};
pub use executor::QueryExecutor;
pub use nodes::{BoolQuery, BoolQueryBuilder, LeafQuery, RangeQuery};
pub use parser::QueryParser;
pub use types::*;
