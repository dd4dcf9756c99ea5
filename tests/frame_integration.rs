//! Integration tests for search frames over an in-memory store

use chrono::NaiveDate;
use serde_json::{json, Value};
use squidex_query::frame::{columns, Metric, OTHER_BUCKET};
use squidex_query::{CollectOptions, DocumentStore, InMemoryStore, QueryError, SearchFrame};
use std::collections::BTreeSet;
use std::sync::Arc;

const INDEX: &str = "profiles";
const TEST_ID: &str = "test_id";

fn source(value: Value) -> squidex_query::Document {
    value.as_object().cloned().unwrap()
}

fn setup_frame() -> SearchFrame {
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
    store
        .index_document(INDEX, Some(TEST_ID), source(json!({"ns1": {"attr1": 10}, "attr2": 4})))
        .unwrap();

    let docs = [
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
    store.bulk(INDEX, docs.into_iter().map(source)).unwrap();

    let store: Arc<dyn DocumentStore> = Arc::new(store);
    SearchFrame::open(store, INDEX).unwrap()
}

fn with_attr1(frame: &SearchFrame) -> SearchFrame {
    frame
        .select(frame.field("ns1.attr1").unwrap().exists())
        .unwrap()
}

#[test]
fn test_get_by_id() {
    let frame = setup_frame();
    let doc = frame.get(TEST_ID, None).unwrap();
    assert_eq!(Value::Object(doc), json!({"ns1": {"attr1": 10}, "attr2": 4}));
}

#[test]
fn test_get_with_fields() {
    let frame = setup_frame();
    let doc = frame.get(TEST_ID, Some(&["attr2".to_string()])).unwrap();
    assert_eq!(Value::Object(doc), json!({"attr2": 4}));

    let doc = frame.get(TEST_ID, Some(&["ns1.attr1".to_string()])).unwrap();
    assert_eq!(Value::Object(doc), json!({"ns1": {"attr1": 10}}));
}

#[test]
fn test_rows_cover_every_column() {
    let frame = setup_frame();
    let rows = frame.to_rows(None).unwrap();
    assert_eq!(rows.len(), 17);
    let found: BTreeSet<&str> = columns(&rows).into_iter().collect();
    let expected: BTreeSet<&str> = [
        "ns2.big_fee",
        "ns4.attr4",
        "ns2.attr3",
        "attr2",
        "ns2.os",
        "ns1.attr2",
        "ns1.attr1",
        "ns3.test_date",
        "ns1.ns2.attr1",
    ]
    .into_iter()
    .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_empty_rows_with_zero_limit() {
    let frame = setup_frame();
    assert!(frame.limit(0).to_rows(None).unwrap().is_empty());
}

#[test]
fn test_take_keeps_frame_limit() {
    let frame = with_attr1(&setup_frame()).limit(3);
    assert_eq!(frame.take(1, None).unwrap().len(), 1);
    assert_eq!(frame.limit_value(), Some(3));
    assert_eq!(frame.collect(CollectOptions::default()).unwrap().len(), 3);
}

#[test]
fn test_collect_with_fields() {
    let frame = with_attr1(&setup_frame());
    let docs = frame
        .collect(CollectOptions::default().with_fields(vec!["ns1.attr1".to_string()]))
        .unwrap();
    assert_eq!(docs.len(), 4);
    for doc in &docs {
        assert!(doc.contains_key("ns1"));
        assert!(!doc.contains_key("attr2"));
    }
}

#[test]
fn test_count() {
    let frame = setup_frame();
    assert_eq!(with_attr1(&frame).count().unwrap(), 4);
    assert_eq!(frame.count().unwrap(), 17);
}

#[test]
fn test_hits_keep_namespaces_nested() {
    let frame = setup_frame();
    let frame = frame
        .select(frame.field("ns2.attr3").unwrap().exists())
        .unwrap();
    let docs = frame.collect(CollectOptions::default()).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(Value::Object(docs[0].clone()), json!({"ns2": {"attr3": false}}));
}

#[test]
fn test_include_score_and_id() {
    let frame = with_attr1(&setup_frame());
    let docs = frame
        .collect(CollectOptions::default().with_score().with_id().with_limit(2))
        .unwrap();
    assert_eq!(docs.len(), 2);
    for doc in &docs {
        assert!(doc["_score"].as_f64().unwrap() > 0.0);
        assert!(!doc["_id"].as_str().unwrap().is_empty());
    }
}

#[test]
fn test_namespace_conditions() {
    let frame = setup_frame();
    let ns2 = frame.namespace("ns2").unwrap();
    assert_eq!(ns2.fields(), vec!["attr3", "big_fee", "os"]);
    assert_eq!(frame.select(ns2.exists()).unwrap().count().unwrap(), 3);
    assert_eq!(frame.select(ns2.invert().exists()).unwrap().count().unwrap(), 14);

    let nested = frame.namespace("ns1").unwrap().namespace("ns2").unwrap();
    let attr1 = nested.field("attr1").unwrap();
    assert_eq!(frame.select(attr1.eq(1)).unwrap().count().unwrap(), 1);
}

#[test]
fn test_chained_selects() {
    let frame = setup_frame();
    let attr1 = frame.field("ns1.attr1").unwrap();
    let selected = frame
        .select(attr1.gt(1).unwrap())
        .unwrap()
        .select((!&attr1).eq(10))
        .unwrap();
    assert_eq!(selected.count().unwrap(), 2);
}

#[test]
fn test_filter_operands() {
    let frame = setup_frame();
    let attr4 = frame.field("ns4.attr4").unwrap();
    let filtered = frame
        .filter(vec![attr4.gt(50).unwrap(), attr4.lt(100).unwrap()])
        .unwrap();
    assert_eq!(filtered.count().unwrap(), 2);
    assert!(matches!(
        frame.filter(vec![json!("ns4.attr4 > 50")]),
        Err(QueryError::BadOperator(_))
    ));
}

#[test]
fn test_frame_algebra() {
    let frame = setup_frame();
    let attr1 = frame.field("ns1.attr1").unwrap();
    let os = frame.field("ns2.os").unwrap();
    let high = frame.select(attr1.ge(5).unwrap()).unwrap();
    let mac = frame.select(os.eq("mac")).unwrap();

    assert_eq!((&high | &mac).count().unwrap(), 4);
    assert_eq!((&high & &mac).count().unwrap(), 0);
    assert_eq!(high.negate().unwrap().count().unwrap(), 14);
    assert!(matches!(frame.negate(), Err(QueryError::MissingQuery)));
}

#[test]
fn test_age_against_fixture_dates() {
    let frame = setup_frame();
    let age = frame.field("ns3.test_date").unwrap().age().unwrap();
    // Every fixture date is years old
    assert_eq!(frame.select(age.gt(365.0).unwrap()).unwrap().count().unwrap(), 3);
    assert_eq!(frame.select(age.lt(365.0).unwrap()).unwrap().count().unwrap(), 0);
}

#[test]
fn test_value_counts() {
    let frame = setup_frame();
    let counts = frame.value_counts("ns1.attr1", None, None).unwrap();
    assert_eq!(
        counts.buckets,
        vec![(json!(5), 2), (json!(1), 1), (json!(10), 1)]
    );
    assert_eq!(
        counts.normalized(),
        vec![(json!(5), 0.5), (json!(1), 0.25), (json!(10), 0.25)]
    );
}

#[test]
fn test_value_counts_above_size() {
    let frame = setup_frame();
    let counts = frame.value_counts("ns1.attr1", Some(1), None).unwrap();
    assert_eq!(counts.buckets, vec![(json!(5), 2), (json!(OTHER_BUCKET), 2)]);
}

#[test]
fn test_value_counts_subquery() {
    let frame = setup_frame();
    let below = frame
        .select(frame.field("ns1.attr1").unwrap().lt(7).unwrap())
        .unwrap();
    let counts = below.value_counts("ns1.attr1", None, None).unwrap();
    assert_eq!(counts.buckets, vec![(json!(5), 2), (json!(1), 1)]);
}

#[test]
fn test_numeric_aggregations() {
    let frame = setup_frame();
    assert_eq!(frame.average("ns1.attr1").unwrap(), Some(Metric::Number(5.25)));
    assert_eq!(frame.max("ns1.attr1").unwrap(), Some(Metric::Number(10.0)));
    assert_eq!(frame.min("ns1.attr1").unwrap(), Some(Metric::Number(1.0)));
    assert_eq!(frame.sum("ns1.attr1", None).unwrap(), 21.0);
    assert_eq!(frame.sum("ns1.attr1", Some(json!(1))).unwrap(), 34.0);
    assert_eq!(frame.nunique("ns1.attr1").unwrap(), 3);
}

#[test]
fn test_date_aggregations() {
    let frame = setup_frame();
    let date = |d: u32, h: u32, m: u32, s: u32, ms: u32| {
        NaiveDate::from_ymd_opt(2019, 7, d)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    };
    assert_eq!(
        frame.average("ns3.test_date").unwrap(),
        Some(Metric::Date(date(5, 23, 41, 58, 571)))
    );
    assert_eq!(
        frame.max("ns3.test_date").unwrap(),
        Some(Metric::Date(date(15, 11, 35, 55, 713)))
    );
    assert_eq!(
        frame.min("ns3.test_date").unwrap(),
        Some(Metric::Date(date(1, 0, 0, 0, 0)))
    );
}

#[test]
fn test_describe() {
    let frame = setup_frame();
    let stats = frame.describe("ns1.attr1", false, None).unwrap();
    assert_eq!(
        Value::Object(stats),
        json!({"count": 4, "max": 10.0, "sum": 21.0, "avg": 5.25, "min": 1.0})
    );

    let extended = frame.describe("ns1.attr1", true, None).unwrap();
    assert_eq!(extended["sum_of_squares"], json!(151.0));
    assert_eq!(extended["variance"], json!(10.1875));
}

#[test]
fn test_aggregation_type_checks() {
    let frame = setup_frame();
    assert!(matches!(frame.average("ns2.os"), Err(QueryError::BadOperator(_))));
    assert!(matches!(frame.sum("ns3.test_date", None), Err(QueryError::BadOperator(_))));
    assert!(matches!(frame.nunique("ns9.nothing"), Err(QueryError::UnknownField(_))));
}
