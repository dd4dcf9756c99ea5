pub mod document;
pub mod search;

pub use document::{lookup, resolve_values, select_fields, Document, DocumentId};
pub use search::{Hit, SearchRequest, SearchResponse};
