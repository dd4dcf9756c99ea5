pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod query;
pub mod schema;

pub use client::{DocumentStore, InMemoryStore};
pub use config::{AnalyzerConfig, Config, FrameConfig, StoreConfig};
pub use error::{QueryError, Result};
pub use frame::{CollectOptions, Operand, SearchFrame};
pub use models::*;
pub use query::{boost, BoolQuery, Boostable, LeafQuery, Query, QueryNode, RangeQuery};
pub use schema::{Field, FieldType, Namespace, Schema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
