//! Semantic tests for the query algebra
//!
//! Each combinator is checked by the documents it matches in an in-memory
//! store rather than by one particular wire shape.

use serde_json::{json, Value};
use squidex_query::query::ClauseKind;
use squidex_query::{
    BoolQuery, Boostable, DocumentStore, InMemoryStore, LeafQuery, Query, QueryNode, RangeQuery,
    SearchRequest,
};
use std::collections::BTreeSet;

const INDEX: &str = "profiles";

fn setup_store() -> InMemoryStore {
    let store = InMemoryStore::default();
    store
        .create_index(
            INDEX,
            json!({"properties": {
                "attr2": {"type": "integer"},
                "ns1": {"properties": {
                    "attr1": {"type": "integer"},
                    "attr2": {"type": "float"},
                    "ns2": {"properties": {"attr1": {"type": "integer"}}}
                }},
                "ns2": {"properties": {
                    "attr3": {"type": "boolean"},
                    "os": {"type": "keyword"},
                    "big_fee": {"type": "scaled_float"}
                }},
                "ns3": {"properties": {"test_date": {"type": "date"}}},
                "ns4": {"properties": {"attr4": {"type": "float"}}}
            }}),
        )
        .unwrap();

    let docs = [
        json!({"ns1": {"attr1": 10}, "attr2": 4}),
        json!({"ns1": {"attr1": 1}}),
        json!({"ns1": {"attr1": 5}}),
        json!({"ns1": {"attr1": 5}}),
        json!({"ns1": {"attr2": 5.0}}),
        json!({"ns2": {"attr3": false}}),
        json!({"ns2": {"os": "mac"}}),
        json!({"ns2": {"big_fee": 10.5999}}),
        json!({"ns3": {"test_date": "2019-07-01"}}),
        json!({"ns3": {"test_date": "2019-07-01 11:30:00"}}),
        json!({"ns3": {"test_date": "2019-07-15T11:35:55.713594"}}),
        json!({"ns4": {"attr4": 2.0}}),
        json!({"ns4": {"attr4": 75.5}}),
        json!({"ns4": {"attr4": 85.5}}),
        json!({"ns4": {"attr4": 120.0}}),
        json!({"attr2": 1}),
        json!({"ns1": {"ns2": {"attr1": 1}}}),
    ];
    store
        .bulk(INDEX, docs.into_iter().map(|d| d.as_object().cloned().unwrap()))
        .unwrap();
    store
}

fn matching(store: &InMemoryStore, query: &Query) -> BTreeSet<String> {
    let body = json!({"query": query.finalize().unwrap()});
    let request = SearchRequest::new(body).with_size(100);
    store
        .search(INDEX, &request)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.id)
        .collect()
}

fn all_ids() -> BTreeSet<String> {
    (1..=17).map(|id| id.to_string()).collect()
}

fn ids(values: &[u32]) -> BTreeSet<String> {
    values.iter().map(|id| id.to_string()).collect()
}

fn attr1_at_least_5() -> Query {
    RangeQuery::new("ns1.attr1").greater_than_or_equal(5).into()
}

fn attr2_exists() -> Query {
    LeafQuery::exists("attr2").into()
}

fn attr4_below_100() -> Query {
    RangeQuery::new("ns4.attr4").less_than(100).into()
}

fn os_is_mac() -> Query {
    LeafQuery::term("ns2.os", "mac").into()
}

/// Every shape the algebra produces: leaves, ranges and mixed bools
fn operands() -> Vec<Query> {
    vec![
        attr1_at_least_5(),
        attr2_exists(),
        attr4_below_100(),
        os_is_mac(),
        attr1_at_least_5() | attr2_exists(),
        attr1_at_least_5() & !attr2_exists(),
        BoolQuery::builder()
            .must(attr4_below_100())
            .should(LeafQuery::term("ns4.attr4", 2.0))
            .build()
            .unwrap()
            .into(),
        BoolQuery::builder()
            .filter(LeafQuery::exists("ns1"))
            .must_not(LeafQuery::term("ns1.attr1", 5))
            .build()
            .unwrap()
            .into(),
    ]
}

#[test]
fn test_leaf_fixture_matches() {
    let store = setup_store();
    assert_eq!(matching(&store, &attr1_at_least_5()), ids(&[1, 3, 4]));
    assert_eq!(matching(&store, &attr2_exists()), ids(&[1, 16]));
    assert_eq!(matching(&store, &attr4_below_100()), ids(&[12, 13, 14]));
    assert_eq!(matching(&store, &os_is_mac()), ids(&[7]));
}

#[test]
fn test_negation_is_complement() {
    let store = setup_store();
    let all = all_ids();
    for query in operands() {
        let matched = matching(&store, &query);
        let complement: BTreeSet<String> = all.difference(&matched).cloned().collect();
        assert_eq!(matching(&store, &!&query), complement, "{:?}", query);
    }
}

#[test]
fn test_double_negation() {
    let store = setup_store();
    for query in operands() {
        assert_eq!(
            matching(&store, &!!query.clone()),
            matching(&store, &query),
            "{:?}",
            query
        );
    }
}

#[test]
fn test_de_morgan() {
    let store = setup_store();
    let operands = operands();
    for left in &operands {
        for right in &operands {
            assert_eq!(
                matching(&store, &!(left & right)),
                matching(&store, &(!left | !right))
            );
            assert_eq!(
                matching(&store, &!(left | right)),
                matching(&store, &(!left & !right))
            );
        }
    }
}

#[test]
fn test_conjunction_and_disjunction_are_set_operations() {
    let store = setup_store();
    let operands = operands();
    for left in &operands {
        for right in &operands {
            let l = matching(&store, left);
            let r = matching(&store, right);
            let both: BTreeSet<String> = l.intersection(&r).cloned().collect();
            let either: BTreeSet<String> = l.union(&r).cloned().collect();
            assert_eq!(matching(&store, &(left & right)), both);
            assert_eq!(matching(&store, &(left | right)), either);
        }
    }
}

#[test]
fn test_associativity() {
    let store = setup_store();
    let a = attr1_at_least_5() | os_is_mac();
    let b = !attr2_exists();
    let c = attr4_below_100() | attr2_exists();
    assert_eq!(
        matching(&store, &((&a & &b) & c.clone())),
        matching(&store, &(a.clone() & (&b & &c)))
    );
    assert_eq!(
        matching(&store, &((&a | &b) | c.clone())),
        matching(&store, &(a | (&b | &c)))
    );
}

#[test]
fn test_or_then_exclude_scenario() {
    let store = setup_store();
    let a = attr1_at_least_5();
    let b = attr2_exists();
    let query = (a.clone() | b.clone()) & !a.clone();
    assert_eq!(
        query.finalize().unwrap(),
        json!({"bool": {
            "should": [a.finalize().unwrap(), b.finalize().unwrap()],
            "must_not": [a.finalize().unwrap()]
        }})
    );
    assert_eq!(matching(&store, &query), ids(&[16]));
}

#[test]
fn test_optional_should_does_not_filter() {
    let store = setup_store();
    let query: Query = BoolQuery::builder()
        .must(attr4_below_100())
        .should(LeafQuery::term("ns4.attr4", 2.0))
        .build()
        .unwrap()
        .into();
    assert_eq!(matching(&store, &query), ids(&[12, 13, 14]));
    let complement: BTreeSet<String> = all_ids().difference(&ids(&[12, 13, 14])).cloned().collect();
    assert_eq!(matching(&store, &!query), complement);
}

#[test]
fn test_boost_keeps_matches() {
    let store = setup_store();
    for query in operands() {
        assert_eq!(matching(&store, &query.boost(3.0)), matching(&store, &query));
    }
}

#[test]
fn test_boost_orders_hits() {
    let store = setup_store();
    let query = LeafQuery::term("ns1.attr1", 1).boost(2.0) | LeafQuery::term("ns1.attr1", 10);
    let request = SearchRequest::new(json!({"query": query.finalize().unwrap()}));
    let hits = store.search(INDEX, &request).unwrap().hits;
    let order: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
    assert_eq!(order, vec!["2", "1"]);
    assert_eq!(hits[0].score, Some(2.0));
}

#[test]
fn test_filter_clauses_match_like_must() {
    let store = setup_store();
    let filtered: Query = BoolQuery::builder()
        .clauses(ClauseKind::Filter, [attr1_at_least_5(), !attr2_exists()])
        .build()
        .unwrap()
        .into();
    assert_eq!(
        matching(&store, &filtered),
        matching(&store, &(attr1_at_least_5() & !attr2_exists()))
    );
}

#[test]
fn test_merge_is_clause_concatenation() {
    let store = setup_store();
    let left = attr1_at_least_5() & !attr2_exists();
    let right: Query = BoolQuery::builder()
        .filter(LeafQuery::exists("ns1.attr1"))
        .build()
        .unwrap()
        .into();
    let merged = left.clone() + right.clone();
    assert_eq!(matching(&store, &merged), ids(&[3, 4]));
    assert_eq!(matching(&store, &merged), matching(&store, &(left & right)));
}

#[test]
fn test_wire_round_trip_preserves_matches() {
    let store = setup_store();
    for query in operands() {
        let reparsed = Query::try_from(query.finalize().unwrap()).unwrap();
        assert_eq!(matching(&store, &reparsed), matching(&store, &query));
    }
}

#[test]
fn test_literal_operand_rejected() {
    let err = Query::try_from(Value::from(5)).unwrap_err();
    assert!(err.is_caller_misuse());
}
