//! Flat row view of nested documents

use crate::models::Document;
use serde_json::Value;
use std::collections::BTreeMap;

/// One document flattened to dot-path columns
pub type Row = BTreeMap<String, Value>;

/// Flatten nested objects into dot-path keys; arrays stay whole
pub fn flatten_document(document: &Document) -> Row {
    let mut row = Row::new();
    flatten_into(&mut row, document, None);
    row
}

fn flatten_into(row: &mut Row, object: &Document, namespace: Option<&str>) {
    for (key, value) in object {
        let column = match namespace {
            Some(namespace) => format!("{}.{}", namespace, key),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => flatten_into(row, child, Some(&column)),
            other => {
                row.insert(column, other.clone());
            }
        }
    }
}

/// Column names across rows, in sorted order
pub fn columns(rows: &[Row]) -> Vec<&str> {
    let mut columns: Vec<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    columns.sort_unstable();
    columns.dedup();
    columns
}
