//! Concrete query node implementations
//!
//! This module provides implementations of the `QueryNode` trait for
//! single-condition leaves, ranges and boolean composites.

mod bool_query;
mod leaf_query;
mod range_query;

pub use bool_query::{BoolQuery, BoolQueryBuilder};
pub use leaf_query::LeafQuery;
pub use range_query::RangeQuery;
