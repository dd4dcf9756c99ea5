//! Boolean query - combines multiple clauses with AND, OR, NOT semantics

use crate::error::QueryError;
use crate::query::ast::{Boostable, Query, QueryNode, WireFragment};
use crate::query::nodes::leaf_query::object1;
use crate::query::types::ClauseKind;
use crate::Result;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::debug;

/// Boolean query combining multiple clauses
///
/// The boolean query supports four types of clauses:
/// - `must`: All clauses must match (AND). Contributes to score.
/// - `filter`: All clauses must match (AND). Does not contribute to score.
/// - `should`: At least one clause should match (OR). Contributes to score.
///   Only required when there are no `must` or `filter` clauses.
/// - `must_not`: No clause must match (NOT). Does not contribute to score.
///
/// At least one clause group is always non-empty. Build one with
/// [`BoolQuery::builder`] or by combining queries with `&`, `|`, `!` and `+`.
///
/// # Example
///
/// ```json
/// {
///   "bool": {
///     "should": [
///       { "term": { "x": 1 } },
///       { "term": { "y": 2 } }
///     ],
///     "must_not": [
///       { "term": { "x": 1 } }
///     ]
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BoolQuery {
    must: Vec<Query>,
    filter: Vec<Query>,
    should: Vec<Query>,
    must_not: Vec<Query>,
    boost: Option<f64>,
}

impl BoolQuery {
    /// Start building a boolean query
    pub fn builder() -> BoolQueryBuilder {
        BoolQueryBuilder::default()
    }

    fn empty() -> Self {
        Self {
            must: Vec::new(),
            filter: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            boost: None,
        }
    }

    /// Bool query with a single populated clause group
    ///
    /// Callers guarantee `clauses` is non-empty.
    pub(crate) fn with_clause(kind: ClauseKind, clauses: Vec<Query>) -> Self {
        let mut query = Self::empty();
        *query.clauses_mut(kind) = clauses;
        query
    }

    /// View any query as a bool query, wrapping non-bool queries into `kind`
    pub(crate) fn wrapped(query: &Query, kind: ClauseKind) -> Cow<'_, BoolQuery> {
        match query {
            Query::Bool(b) => Cow::Borrowed(b.as_ref()),
            other => Cow::Owned(Self::with_clause(kind, vec![other.clone()])),
        }
    }

    pub(crate) fn as_must(query: &Query) -> Cow<'_, BoolQuery> {
        Self::wrapped(query, ClauseKind::Must)
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Clauses of one group
    pub fn clauses(&self, kind: ClauseKind) -> &[Query] {
        match kind {
            ClauseKind::Must => &self.must,
            ClauseKind::Filter => &self.filter,
            ClauseKind::Should => &self.should,
            ClauseKind::MustNot => &self.must_not,
        }
    }

    fn clauses_mut(&mut self, kind: ClauseKind) -> &mut Vec<Query> {
        match kind {
            ClauseKind::Must => &mut self.must,
            ClauseKind::Filter => &mut self.filter,
            ClauseKind::Should => &mut self.should,
            ClauseKind::MustNot => &mut self.must_not,
        }
    }

    pub fn must(&self) -> &[Query] {
        &self.must
    }

    pub fn filter(&self) -> &[Query] {
        &self.filter
    }

    pub fn should(&self) -> &[Query] {
        &self.should
    }

    pub fn must_not(&self) -> &[Query] {
        &self.must_not
    }

    /// Non-empty clause groups in rendering order
    pub fn filtered_clauses(&self) -> impl Iterator<Item = (ClauseKind, &[Query])> + '_ {
        ClauseKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.clauses(kind)))
            .filter(|(_, clauses)| !clauses.is_empty())
    }

    /// Kinds of the non-empty clause groups
    pub fn clause_kinds(&self) -> BTreeSet<ClauseKind> {
        self.filtered_clauses().map(|(kind, _)| kind).collect()
    }

    /// Get total number of clauses
    pub fn clause_count(&self) -> usize {
        self.must.len() + self.filter.len() + self.should.len() + self.must_not.len()
    }

    /// Whether at least one `should` clause has to match
    pub fn has_required_should(&self) -> bool {
        !self.should.is_empty() && !self.has_match_clauses()
    }

    fn has_match_clauses(&self) -> bool {
        !self.must.is_empty() || !self.filter.is_empty()
    }

    fn single_must(&self) -> Option<&Query> {
        match self.must.as_slice() {
            [only] if self.filter.is_empty() && self.should.is_empty() && self.must_not.is_empty() => {
                Some(only)
            }
            _ => None,
        }
    }

    /// Concatenate each clause group of `self` and `other` (`+`)
    ///
    /// The result carries no boost.
    pub fn merge(&self, other: &BoolQuery) -> BoolQuery {
        let mut merged = self.clone();
        merged.boost = None;
        for kind in ClauseKind::ALL {
            merged
                .clauses_mut(kind)
                .extend(other.clauses(kind).iter().cloned());
        }
        merged
    }

    /// Flatten every clause group into `destination`
    ///
    /// Clauses already in `destination` are kept as they are; every other
    /// non-empty group becomes a single-group bool query appended to the list.
    /// The list has the meaning of this query only when placed in a
    /// `must`/`filter` group and this query has no optional `should` clauses,
    /// or placed in a `should`/`must_not` group and this query has a single
    /// clause group.
    pub fn explode(&self, destination: ClauseKind) -> Vec<Query> {
        let mut exploded = self.clauses(destination).to_vec();
        for (kind, clauses) in self.filtered_clauses() {
            if kind != destination {
                exploded.push(Query::from(Self::with_clause(kind, clauses.to_vec())));
            }
        }
        exploded
    }

    /// Conjunction of two queries
    ///
    /// Leaves count as `bool.must[leaf]`. The operands are merged clause-wise
    /// when one is a leaf or their clause kinds are disjoint, unless either is
    /// boosted or a required `should` group would become optional or fuse with
    /// the other side's `should` group. Otherwise both are nested under `must`.
    pub fn conjoin(left: &Query, right: &Query) -> BoolQuery {
        let lhs = Self::wrapped(left, ClauseKind::Must);
        let rhs = Self::wrapped(right, ClauseKind::Must);
        let has_leaf = !left.is_bool() || !right.is_bool();

        if lhs.can_conjoin_flat(&rhs, has_leaf) {
            return lhs.merge(&rhs);
        }

        debug!(
            left = left.query_type(),
            right = right.query_type(),
            "nesting conjunction operands"
        );
        Self::with_clause(ClauseKind::Must, vec![left.clone(), right.clone()])
    }

    fn can_conjoin_flat(&self, other: &BoolQuery, has_leaf: bool) -> bool {
        if self.boost.is_some() || other.boost.is_some() {
            return false;
        }
        if !has_leaf && !self.clause_kinds().is_disjoint(&other.clause_kinds()) {
            return false;
        }

        let fused_should = !self.should.is_empty() && !other.should.is_empty();
        let left_relaxed = self.has_required_should() && other.has_match_clauses();
        let right_relaxed = other.has_required_should() && self.has_match_clauses();
        !(fused_should || left_relaxed || right_relaxed)
    }

    /// Disjunction of two queries
    ///
    /// Leaves count as `bool.should[leaf]`. A leaf joins a pure `should`
    /// operand directly; everything else is nested under `should`.
    pub fn disjoin(left: &Query, right: &Query) -> BoolQuery {
        let lhs = Self::wrapped(left, ClauseKind::Should);
        let rhs = Self::wrapped(right, ClauseKind::Should);
        let has_leaf = !left.is_bool() || !right.is_bool();

        if has_leaf && lhs.is_pure_should() && rhs.is_pure_should() {
            return lhs.merge(&rhs);
        }

        debug!(
            left = left.query_type(),
            right = right.query_type(),
            "nesting disjunction operands"
        );
        Self::with_clause(ClauseKind::Should, vec![left.clone(), right.clone()])
    }

    fn is_pure_should(&self) -> bool {
        self.boost.is_none()
            && !self.should.is_empty()
            && !self.has_match_clauses()
            && self.must_not.is_empty()
    }

    /// Logical complement of this query (`!`)
    ///
    /// A bool query matches when every `must`/`filter` clause matches, no
    /// `must_not` clause matches and, if `should` is required, one `should`
    /// clause matches. The complement is the disjunction of the negated
    /// requirements:
    ///
    /// - each `must` and `filter` clause, negated
    /// - each `must_not` clause as is
    /// - the conjunction of the negated `should` clauses, when required
    ///
    /// Optional `should` clauses only affect scoring and are dropped. A single
    /// alternative is returned without the `should` wrapper. The boost does
    /// not carry over.
    ///
    /// For `must=[a], must_not=[b]` this gives `should=[!a, b]`. Swapping the
    /// groups instead (`must=[b], should=[!a]`) would leave `should` optional
    /// next to `must` and match only `b`, missing documents with neither.
    pub fn negate(&self) -> BoolQuery {
        let mut alternatives: Vec<Query> = self
            .must
            .iter()
            .chain(self.filter.iter())
            .map(negate_clause)
            .collect();
        alternatives.extend(self.must_not.iter().cloned());

        if self.has_required_should() {
            let negated: Vec<Query> = self.should.iter().map(negate_clause).collect();
            alternatives.push(conjunction_of(negated));
        }

        if alternatives.len() == 1 {
            if let Some(only) = alternatives.pop() {
                return into_bool(only);
            }
        }
        Self::with_clause(ClauseKind::Should, alternatives)
    }
}

fn negate_clause(query: &Query) -> Query {
    query.negate()
}

fn conjunction_of(mut queries: Vec<Query>) -> Query {
    if queries.len() == 1 {
        if let Some(only) = queries.pop() {
            return only;
        }
    }
    Query::from(BoolQuery::with_clause(ClauseKind::Must, queries))
}

fn into_bool(query: Query) -> BoolQuery {
    match query {
        Query::Bool(b) => std::sync::Arc::try_unwrap(b).unwrap_or_else(|shared| (*shared).clone()),
        other => BoolQuery::with_clause(ClauseKind::Must, vec![other]),
    }
}

impl QueryNode for BoolQuery {
    fn finalize(&self) -> Result<WireFragment> {
        if let Some(only) = self.single_must() {
            return match self.boost {
                Some(boost) => only.boost(boost).finalize(),
                None => only.finalize(),
            };
        }

        let mut body = Map::new();
        for (kind, clauses) in self.filtered_clauses() {
            let rendered = clauses
                .iter()
                .map(|clause| clause.finalize())
                .collect::<Result<Vec<_>>>()?;
            body.insert(kind.as_str().to_string(), Value::Array(rendered));
        }
        if let Some(boost) = self.boost {
            body.insert("boost".to_string(), Value::from(boost));
        }

        Ok(object1("bool", Value::Object(body)))
    }

    fn query_type(&self) -> &'static str {
        "bool"
    }

    fn boost_factor(&self) -> Option<f64> {
        self.boost
    }

    fn is_scoring(&self) -> bool {
        !self.must.is_empty() || !self.should.is_empty()
    }
}

impl Boostable for BoolQuery {
    fn boost(&self, value: f64) -> Self {
        self.clone().with_boost(value)
    }
}

/// Builder for [`BoolQuery`]
#[derive(Clone, Debug, Default)]
pub struct BoolQueryBuilder {
    must: Vec<Query>,
    filter: Vec<Query>,
    should: Vec<Query>,
    must_not: Vec<Query>,
    boost: Option<f64>,
}

impl BoolQueryBuilder {
    /// Add a clause to the given group
    pub fn clause(mut self, kind: ClauseKind, query: impl Into<Query>) -> Self {
        self.group(kind).push(query.into());
        self
    }

    /// Add several clauses to the given group
    pub fn clauses<I, Q>(mut self, kind: ClauseKind, queries: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<Query>,
    {
        self.group(kind).extend(queries.into_iter().map(Into::into));
        self
    }

    fn group(&mut self, kind: ClauseKind) -> &mut Vec<Query> {
        match kind {
            ClauseKind::Must => &mut self.must,
            ClauseKind::Filter => &mut self.filter,
            ClauseKind::Should => &mut self.should,
            ClauseKind::MustNot => &mut self.must_not,
        }
    }

    /// Add a must clause
    pub fn must(self, query: impl Into<Query>) -> Self {
        self.clause(ClauseKind::Must, query)
    }

    /// Add a filter clause
    pub fn filter(self, query: impl Into<Query>) -> Self {
        self.clause(ClauseKind::Filter, query)
    }

    /// Add a should clause
    pub fn should(self, query: impl Into<Query>) -> Self {
        self.clause(ClauseKind::Should, query)
    }

    /// Add a must_not clause
    pub fn must_not(self, query: impl Into<Query>) -> Self {
        self.clause(ClauseKind::MustNot, query)
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Build the query, failing when every clause group is empty
    pub fn build(self) -> Result<BoolQuery> {
        let query = BoolQuery {
            must: self.must,
            filter: self.filter,
            should: self.should,
            must_not: self.must_not,
            boost: self.boost,
        };
        if query.clause_count() == 0 {
            return Err(QueryError::Validation(
                "At least one of must, filter, should or must_not must be given".to_string(),
            ));
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::{LeafQuery, RangeQuery};
    use serde_json::json;

    fn t(field: &str, value: i64) -> Query {
        Query::from(LeafQuery::term(field, value))
    }

    fn wire(field: &str, value: i64) -> Value {
        json!({"term": {field: value}})
    }

    #[test]
    fn test_empty_bool_is_rejected() {
        let err = BoolQuery::builder().build().unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
        assert!(BoolQuery::builder().boost(2.0).build().is_err());
    }

    #[test]
    fn test_builder_groups() {
        let q = BoolQuery::builder()
            .must(t("a", 1))
            .filter(t("b", 2))
            .should(t("c", 3))
            .must_not(t("d", 4))
            .build()
            .unwrap();
        assert_eq!(q.clause_count(), 4);
        assert_eq!(
            q.finalize().unwrap(),
            json!({"bool": {
                "must": [wire("a", 1)],
                "filter": [wire("b", 2)],
                "should": [wire("c", 3)],
                "must_not": [wire("d", 4)]
            }})
        );
    }

    #[test]
    fn test_single_must_collapses() {
        let q = BoolQuery::builder().must(t("x", 1)).build().unwrap();
        assert_eq!(q.finalize().unwrap(), wire("x", 1));
    }

    #[test]
    fn test_single_must_collapse_delegates_boost() {
        let q = BoolQuery::builder()
            .must(t("x", 1))
            .boost(2.0)
            .build()
            .unwrap();
        assert_eq!(
            q.finalize().unwrap(),
            json!({"term": {"x": {"value": 1, "boost": 2.0}}})
        );
    }

    #[test]
    fn test_boosted_bool_shape() {
        let q = BoolQuery::builder()
            .should(t("x", 1))
            .should(t("y", 2))
            .build()
            .unwrap()
            .boost(3.0);
        assert_eq!(
            q.finalize().unwrap(),
            json!({"bool": {"should": [wire("x", 1), wire("y", 2)], "boost": 3.0}})
        );
    }

    #[test]
    fn test_single_should_does_not_collapse() {
        let q = BoolQuery::builder().should(t("x", 1)).build().unwrap();
        assert_eq!(
            q.finalize().unwrap(),
            json!({"bool": {"should": [wire("x", 1)]}})
        );
    }

    #[test]
    fn test_merge_concatenates_and_drops_boost() {
        let left = BoolQuery::builder()
            .must(t("a", 1))
            .boost(2.0)
            .build()
            .unwrap();
        let right = BoolQuery::builder()
            .must(t("b", 2))
            .must_not(t("c", 3))
            .build()
            .unwrap();
        let merged = left.merge(&right);
        assert_eq!(merged.must(), &[t("a", 1), t("b", 2)]);
        assert_eq!(merged.must_not(), &[t("c", 3)]);
        assert_eq!(merged.boost_factor(), None);
    }

    #[test]
    fn test_explode_into_must() {
        let q = BoolQuery::builder()
            .must(t("a", 1))
            .filter(t("b", 2))
            .must_not(t("c", 3))
            .build()
            .unwrap();
        let exploded = q.explode(ClauseKind::Must);
        assert_eq!(exploded.len(), 3);
        assert_eq!(exploded[0], t("a", 1));
        assert_eq!(
            exploded[1],
            Query::from(BoolQuery::with_clause(ClauseKind::Filter, vec![t("b", 2)]))
        );
        assert_eq!(
            exploded[2].finalize().unwrap(),
            json!({"bool": {"must_not": [wire("c", 3)]}})
        );
    }

    #[test]
    fn test_leaf_and_leaf_flattens() {
        let q = BoolQuery::conjoin(&t("x", 1), &t("y", 2));
        assert_eq!(q.must(), &[t("x", 1), t("y", 2)]);
        assert_eq!(q.clause_kinds().len(), 1);
    }

    #[test]
    fn test_leaf_joins_must_bool() {
        let left = Query::from(BoolQuery::conjoin(&t("a", 1), &t("b", 2)));
        let q = BoolQuery::conjoin(&left, &t("c", 3));
        assert_eq!(q.must(), &[t("a", 1), t("b", 2), t("c", 3)]);

        let q = BoolQuery::conjoin(&t("c", 3), &left);
        assert_eq!(q.must(), &[t("c", 3), t("a", 1), t("b", 2)]);
    }

    #[test]
    fn test_disjoint_bools_merge() {
        let either = Query::from(BoolQuery::disjoin(&t("x", 1), &t("y", 2)));
        let not_x = t("x", 1).negate();
        let q = BoolQuery::conjoin(&either, &not_x);
        assert_eq!(
            q.finalize().unwrap(),
            json!({"bool": {
                "should": [wire("x", 1), wire("y", 2)],
                "must_not": [wire("x", 1)]
            }})
        );
    }

    #[test]
    fn test_overlapping_bools_nest() {
        let left = Query::from(BoolQuery::disjoin(&t("a", 1), &t("b", 2)));
        let right = Query::from(BoolQuery::disjoin(&t("c", 3), &t("d", 4)));
        let q = BoolQuery::conjoin(&left, &right);
        assert_eq!(q.must(), &[left.clone(), right.clone()]);
        assert!(q.should().is_empty());
    }

    #[test]
    fn test_required_should_is_not_relaxed_by_leaf() {
        let either = Query::from(BoolQuery::disjoin(&t("a", 1), &t("b", 2)));
        let q = BoolQuery::conjoin(&either, &t("c", 3));
        assert_eq!(q.must(), &[either.clone(), t("c", 3)]);
        assert!(q.should().is_empty());
    }

    #[test]
    fn test_boosted_operand_nests() {
        let boosted = Query::from(RangeQuery::new("n").greater_than(5)).boost(2.0);
        let must_bool = Query::from(BoolQuery::conjoin(&t("a", 1), &t("b", 2))).boost(3.0);
        let q = BoolQuery::conjoin(&must_bool, &boosted);
        assert_eq!(q.must(), &[must_bool.clone(), boosted.clone()]);
    }

    #[test]
    fn test_leaf_or_leaf_flattens() {
        let q = BoolQuery::disjoin(&t("x", 1), &t("y", 2));
        assert_eq!(q.should(), &[t("x", 1), t("y", 2)]);
    }

    #[test]
    fn test_leaf_joins_should_bool() {
        let either = Query::from(BoolQuery::disjoin(&t("a", 1), &t("b", 2)));
        let q = BoolQuery::disjoin(&either, &t("c", 3));
        assert_eq!(q.should(), &[t("a", 1), t("b", 2), t("c", 3)]);
    }

    #[test]
    fn test_or_with_must_bool_nests() {
        let both = Query::from(BoolQuery::conjoin(&t("a", 1), &t("b", 2)));
        let q = BoolQuery::disjoin(&both, &t("c", 3));
        assert_eq!(q.should(), &[both.clone(), t("c", 3)]);
    }

    #[test]
    fn test_or_with_must_not_bool_nests() {
        let not_a = t("a", 1).negate();
        let q = BoolQuery::disjoin(&not_a, &t("c", 3));
        assert_eq!(
            q.finalize().unwrap(),
            json!({"bool": {"should": [
                {"bool": {"must_not": [wire("a", 1)]}},
                wire("c", 3)
            ]}})
        );
    }

    #[test]
    fn test_negate_conjunction() {
        let both = BoolQuery::conjoin(&t("a", 1), &t("b", 2));
        assert_eq!(
            both.negate().finalize().unwrap(),
            json!({"bool": {"should": [
                {"bool": {"must_not": [wire("a", 1)]}},
                {"bool": {"must_not": [wire("b", 2)]}}
            ]}})
        );
    }

    #[test]
    fn test_negate_disjunction() {
        let either = BoolQuery::disjoin(&t("a", 1), &t("b", 2));
        assert_eq!(
            either.negate().finalize().unwrap(),
            json!({"bool": {"must": [
                {"bool": {"must_not": [wire("a", 1)]}},
                {"bool": {"must_not": [wire("b", 2)]}}
            ]}})
        );
    }

    #[test]
    fn test_negate_single_must_not_is_identity() {
        let not_a = BoolQuery::with_clause(ClauseKind::MustNot, vec![t("a", 1)]);
        assert_eq!(not_a.negate().finalize().unwrap(), wire("a", 1));
    }

    #[test]
    fn test_negate_mixed_must_and_must_not() {
        let q = BoolQuery::builder()
            .must(t("a", 1))
            .must_not(t("b", 2))
            .build()
            .unwrap();
        assert_eq!(
            q.negate().finalize().unwrap(),
            json!({"bool": {"should": [
                {"bool": {"must_not": [wire("a", 1)]}},
                wire("b", 2)
            ]}})
        );
    }

    #[test]
    fn test_negate_mixed_shape_matches_documents_with_neither() {
        use crate::query::executor::QueryExecutor;

        let documents: Vec<crate::models::Document> = [
            json!({"a": 1}),
            json!({"b": 2}),
            json!({"a": 1, "b": 2}),
            json!({}),
        ]
        .into_iter()
        .map(|d| d.as_object().cloned().unwrap())
        .collect();
        let executor = QueryExecutor::new(&documents);

        let q = BoolQuery::builder()
            .must(t("a", 1))
            .must_not(t("b", 2))
            .build()
            .unwrap();
        let matched: Vec<u32> = executor.execute(&Query::from(q.clone())).unwrap().iter().collect();
        let negated: Vec<u32> = executor
            .execute(&Query::from(q.negate()))
            .unwrap()
            .iter()
            .collect();
        assert_eq!(matched, vec![0]);
        assert_eq!(negated, vec![1, 2, 3]);
    }

    #[test]
    fn test_negate_ignores_optional_should() {
        let q = BoolQuery::builder()
            .must(t("a", 1))
            .should(t("b", 2))
            .build()
            .unwrap();
        assert_eq!(
            q.negate().finalize().unwrap(),
            json!({"bool": {"must_not": [wire("a", 1)]}})
        );
    }

    #[test]
    fn test_negate_drops_boost() {
        let q = BoolQuery::disjoin(&t("a", 1), &t("b", 2)).with_boost(2.0);
        assert_eq!(q.negate().boost_factor(), None);
    }

    #[test]
    fn test_finalize_propagates_range_error() {
        let q = BoolQuery::builder()
            .must(RangeQuery::new("n"))
            .must(t("a", 1))
            .build()
            .unwrap();
        assert!(matches!(q.finalize(), Err(QueryError::Validation(_))));
    }

    #[test]
    fn test_is_scoring() {
        let filter_only = BoolQuery::with_clause(ClauseKind::Filter, vec![t("a", 1)]);
        assert!(!filter_only.is_scoring());
        assert!(BoolQuery::conjoin(&t("a", 1), &t("b", 2)).is_scoring());
    }
}
