use serde_json::{Map, Value};

/// Document identifier in an index
pub type DocumentId = String;

/// Source of a stored document
pub type Document = Map<String, Value>;

/// Collect every value stored under a dot-path
///
/// Arrays met along the way, and at the end of the path, are flattened so
/// that each element is matched on its own.
pub fn resolve_values<'a>(source: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = source.get(*first) {
            collect_values(value, rest, &mut out);
        }
    }
    out
}

fn collect_values<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match (value, segments.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                collect_values(item, segments, out);
            }
        }
        (_, None) => out.push(value),
        (Value::Object(map), Some((first, rest))) => {
            if let Some(child) = map.get(*first) {
                collect_values(child, rest, out);
            }
        }
        _ => {}
    }
}

/// Value at a dot-path, without descending into arrays
pub fn lookup<'a>(source: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = source.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Keep only the given dot-paths of a document, preserving nesting
pub fn select_fields(source: &Document, fields: &[String]) -> Document {
    let mut selected = Document::new();
    for field in fields {
        if let Some(value) = lookup(source, field) {
            insert_path(&mut selected, field, value.clone());
        }
    }
    selected
}

fn insert_path(target: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}
