//! Abstract Syntax Tree for query representation
//!
//! This module defines the `QueryNode` trait that every query node implements,
//! the `Query` sum type that the combinators operate on, and the operator
//! overloads (`&`, `|`, `!`, `+`) that build boolean composites.

use crate::error::QueryError;
use crate::query::nodes::{BoolQuery, LeafQuery, RangeQuery};
use crate::query::parser::QueryParser;
use crate::Result;
use serde_json::Value;
use std::fmt::Debug;
use std::ops::{Add, BitAnd, BitOr, Not};
use std::sync::Arc;

/// Finalized query body in the document store's JSON query grammar
pub type WireFragment = Value;

/// Core trait for all query nodes
///
/// Finalizing is pure and repeatable: calling `finalize` twice on the same
/// node yields the same fragment and never consumes the node.
pub trait QueryNode: Send + Sync + Debug {
    /// Render the node into its wire-format fragment
    fn finalize(&self) -> Result<WireFragment>;

    /// Get the query type name for debugging and logging
    fn query_type(&self) -> &'static str;

    /// Get the boost factor, if one was set
    fn boost_factor(&self) -> Option<f64>;

    /// Whether this query contributes to relevance scoring
    fn is_scoring(&self) -> bool {
        true
    }
}

/// Copy-on-write weighting of a query node
pub trait Boostable: Sized {
    /// Return a copy of this query with its boost set to `value`
    fn boost(&self, value: f64) -> Self;
}

/// Boost the weight of a query by `value`
///
/// Sugar for `query.boost(value)` that keeps long expressions free of an
/// extra pair of parentheses:
///
/// ```
/// use squidex_query::{boost, LeafQuery, RangeQuery};
///
/// let q = boost(&RangeQuery::new("attr1").greater_than(5), 2.0)
///     & boost(&LeafQuery::term("attr2", 1), 3.0);
/// # let _ = q;
/// ```
pub fn boost<Q: Boostable>(query: &Q, value: f64) -> Q {
    query.boost(value)
}

/// Any query node: a leaf condition, a range, or a boolean composite
///
/// Children are reference-counted so combining queries shares subtrees
/// instead of copying them.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Leaf(Arc<LeafQuery>),
    Range(Arc<RangeQuery>),
    Bool(Arc<BoolQuery>),
}

impl Query {
    /// Borrow the boolean composite, if this is one
    pub fn as_bool(&self) -> Option<&BoolQuery> {
        match self {
            Query::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Query::Bool(_))
    }

    /// Conjunction (`self & other`)
    pub fn and(&self, other: &Query) -> Query {
        Query::from(BoolQuery::conjoin(self, other))
    }

    /// Disjunction (`self | other`)
    pub fn or(&self, other: &Query) -> Query {
        Query::from(BoolQuery::disjoin(self, other))
    }

    /// Negation (`!self`)
    ///
    /// A leaf becomes `bool.must_not[leaf]`; a boolean composite is rewritten
    /// with De Morgan's laws.
    pub fn negate(&self) -> Query {
        match self {
            Query::Bool(b) => Query::from(b.negate()),
            other => Query::from(BoolQuery::with_clause(
                crate::query::types::ClauseKind::MustNot,
                vec![other.clone()],
            )),
        }
    }

    /// Clause-wise merge (`self + other`)
    ///
    /// Non-boolean operands are treated as `bool.must[query]`.
    pub fn merge(&self, other: &Query) -> Query {
        Query::from(BoolQuery::as_must(self).merge(&BoolQuery::as_must(other)))
    }

    /// Fold `query` into an optional accumulator with `&`
    pub fn combine_and(acc: Option<Query>, query: Query) -> Query {
        match acc {
            Some(existing) => existing.and(&query),
            None => query,
        }
    }

    /// Conjunction where either side may be absent
    pub fn and_option(lhs: Option<&Query>, rhs: Option<&Query>) -> Option<Query> {
        match (lhs, rhs) {
            (Some(l), Some(r)) => Some(l.and(r)),
            (Some(q), None) | (None, Some(q)) => Some(q.clone()),
            (None, None) => None,
        }
    }

    /// Disjunction where either side may be absent
    pub fn or_option(lhs: Option<&Query>, rhs: Option<&Query>) -> Option<Query> {
        match (lhs, rhs) {
            (Some(l), Some(r)) => Some(l.or(r)),
            (Some(q), None) | (None, Some(q)) => Some(q.clone()),
            (None, None) => None,
        }
    }

    /// Negate an optional query, failing when there is nothing to negate
    pub fn negate_option(query: Option<&Query>) -> Result<Query> {
        query.map(Query::negate).ok_or(QueryError::MissingQuery)
    }

    fn node(&self) -> &dyn QueryNode {
        match self {
            Query::Leaf(q) => q.as_ref(),
            Query::Range(q) => q.as_ref(),
            Query::Bool(q) => q.as_ref(),
        }
    }
}

impl QueryNode for Query {
    fn finalize(&self) -> Result<WireFragment> {
        let fragment = self.node().finalize()?;
        tracing::trace!(query_type = self.query_type(), "finalized query");
        Ok(fragment)
    }

    fn query_type(&self) -> &'static str {
        self.node().query_type()
    }

    fn boost_factor(&self) -> Option<f64> {
        self.node().boost_factor()
    }

    fn is_scoring(&self) -> bool {
        self.node().is_scoring()
    }
}

impl Boostable for Query {
    fn boost(&self, value: f64) -> Self {
        match self {
            Query::Leaf(q) => Query::from(q.boost(value)),
            Query::Range(q) => Query::from(q.boost(value)),
            Query::Bool(q) => Query::from(q.boost(value)),
        }
    }
}

impl From<LeafQuery> for Query {
    fn from(query: LeafQuery) -> Self {
        Query::Leaf(Arc::new(query))
    }
}

impl From<RangeQuery> for Query {
    fn from(query: RangeQuery) -> Self {
        Query::Range(Arc::new(query))
    }
}

impl From<BoolQuery> for Query {
    fn from(query: BoolQuery) -> Self {
        Query::Bool(Arc::new(query))
    }
}

impl TryFrom<Value> for Query {
    type Error = QueryError;

    /// Accept a wire fragment as a query operand
    ///
    /// Scalars and arrays are rejected; they usually come from comparing a
    /// field accessor with `==` semantics that produced a plain boolean.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => QueryParser::parse(&value),
            other => Err(QueryError::BadOperator(format!(
                "expected a query, got `{}`",
                other
            ))),
        }
    }
}

macro_rules! impl_binary_ops {
    ($lhs:ty => $($rhs:ty),+) => {
        $(
            impl BitAnd<$rhs> for $lhs {
                type Output = Query;

                fn bitand(self, rhs: $rhs) -> Query {
                    Query::from(self).and(&Query::from(rhs))
                }
            }

            impl BitOr<$rhs> for $lhs {
                type Output = Query;

                fn bitor(self, rhs: $rhs) -> Query {
                    Query::from(self).or(&Query::from(rhs))
                }
            }

            impl Add<$rhs> for $lhs {
                type Output = Query;

                fn add(self, rhs: $rhs) -> Query {
                    Query::from(self).merge(&Query::from(rhs))
                }
            }
        )+
    };
}

macro_rules! impl_not {
    ($($ty:ty),+) => {
        $(
            impl Not for $ty {
                type Output = Query;

                fn not(self) -> Query {
                    Query::from(self).negate()
                }
            }
        )+
    };
}

impl_binary_ops!(Query => Query, LeafQuery, RangeQuery, BoolQuery);
impl_binary_ops!(LeafQuery => Query, LeafQuery, RangeQuery, BoolQuery);
impl_binary_ops!(RangeQuery => Query, LeafQuery, RangeQuery, BoolQuery);
impl_binary_ops!(BoolQuery => Query, LeafQuery, RangeQuery, BoolQuery);
impl_not!(Query, LeafQuery, RangeQuery, BoolQuery);

impl BitAnd<&Query> for &Query {
    type Output = Query;

    fn bitand(self, rhs: &Query) -> Query {
        self.and(rhs)
    }
}

impl BitOr<&Query> for &Query {
    type Output = Query;

    fn bitor(self, rhs: &Query) -> Query {
        self.or(rhs)
    }
}

impl Not for &Query {
    type Output = Query;

    fn not(self) -> Query {
        self.negate()
    }
}

/// `query & None` is the query itself
impl BitAnd<Option<Query>> for Query {
    type Output = Query;

    fn bitand(self, rhs: Option<Query>) -> Query {
        match rhs {
            Some(other) => self.and(&other),
            None => self,
        }
    }
}

/// `query | None` is the query itself
impl BitOr<Option<Query>> for Query {
    type Output = Query;

    fn bitor(self, rhs: Option<Query>) -> Query {
        match rhs {
            Some(other) => self.or(&other),
            None => self,
        }
    }
}
