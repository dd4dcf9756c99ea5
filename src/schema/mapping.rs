//! Index mapping introspection
//!
//! Turns the raw mapping returned by the store into a lookup table from
//! dot-path to field type, plus the set of namespaces (object properties).

use super::accessor::{Field, Namespace};
use super::field_type::FieldType;
use crate::error::QueryError;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Typed view of an index mapping
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    index: String,
    fields: BTreeMap<String, FieldType>,
    namespaces: BTreeSet<String>,
}

impl Schema {
    /// Build a schema from a `get_mapping` response
    ///
    /// Accepts `{index: {mappings: {properties}}}`, `{mappings: {properties}}`,
    /// `{properties}` and the legacy form with a document type name between
    /// `mappings` and `properties`.
    pub fn from_mapping(index: &str, raw: &Value) -> Result<Self> {
        let properties = find_properties(index, raw)
            .filter(|properties| !properties.is_empty())
            .ok_or_else(|| QueryError::MissingMapping(index.to_string()))?;
        Self::from_properties(index, properties)
    }

    /// Build a schema from a `properties` object
    pub fn from_properties(index: &str, properties: &Map<String, Value>) -> Result<Self> {
        let mut schema = Schema {
            index: index.to_string(),
            ..Default::default()
        };
        schema.parse_properties(properties, None)?;
        tracing::debug!(
            index,
            fields = schema.fields.len(),
            namespaces = schema.namespaces.len(),
            "parsed mapping"
        );
        Ok(schema)
    }

    fn parse_properties(&mut self, properties: &Map<String, Value>, prefix: Option<&str>) -> Result<()> {
        for (name, definition) in properties {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };
            let mapping_type = definition.get("type").and_then(Value::as_str);
            let children = definition.get("properties").and_then(Value::as_object);

            match mapping_type {
                Some(t) if !FieldType::is_namespace_type(t) => {
                    self.add_field(&path, FieldType::from_mapping_type(t))?
                }
                Some(_) => self.add_namespace(&path)?,
                None => {}
            }
            if let Some(children) = children {
                self.add_namespace(&path)?;
                self.parse_properties(children, Some(&path))?;
            }
        }
        Ok(())
    }

    fn add_field(&mut self, path: &str, field_type: FieldType) -> Result<()> {
        if self.namespaces.contains(path) {
            return Err(QueryError::FieldConflict(path.to_string()));
        }
        self.fields.insert(path.to_string(), field_type);
        Ok(())
    }

    fn add_namespace(&mut self, path: &str) -> Result<()> {
        if self.fields.contains_key(path) {
            return Err(QueryError::FieldConflict(path.to_string()));
        }
        self.namespaces.insert(path.to_string());
        Ok(())
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn field_type(&self, path: &str) -> Option<FieldType> {
        self.fields.get(path).copied()
    }

    pub fn is_namespace(&self, path: &str) -> bool {
        self.namespaces.contains(path)
    }

    /// Accessor for the field at `path`
    pub fn field(&self, path: &str) -> Result<Field> {
        self.field_type(path)
            .map(|field_type| Field::new(path, field_type))
            .ok_or_else(|| QueryError::UnknownField(path.to_string()))
    }

    /// Accessor for the namespace at `path`
    pub fn namespace(&self, path: &str) -> Result<Namespace<'_>> {
        if self.is_namespace(path) {
            Ok(Namespace::new(self, path))
        } else {
            Err(QueryError::UnknownField(path.to_string()))
        }
    }

    /// Root-level field names
    pub fn fields(&self) -> Vec<&str> {
        direct_children(self.fields.keys(), None)
    }

    /// Root-level namespace names
    pub fn namespaces(&self) -> Vec<&str> {
        direct_children(self.namespaces.iter(), None)
    }

    /// Field names directly under `namespace`
    pub fn child_fields(&self, namespace: &str) -> Vec<&str> {
        direct_children(self.fields.keys(), Some(namespace))
    }

    /// Namespace names directly under `namespace`
    pub fn child_namespaces(&self, namespace: &str) -> Vec<&str> {
        direct_children(self.namespaces.iter(), Some(namespace))
    }

    /// Every field by dot-path
    pub fn dtypes(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }
}

fn find_properties<'a>(index: &str, raw: &'a Value) -> Option<&'a Map<String, Value>> {
    let root = raw.get(index).unwrap_or(raw);
    let mappings = root.get("mappings").unwrap_or(root);
    if let Some(properties) = mappings.get("properties") {
        return properties.as_object();
    }
    // Legacy mappings keyed by document type
    match mappings.as_object() {
        Some(types) if types.len() == 1 => types
            .values()
            .next()
            .and_then(|doc_type| doc_type.get("properties"))
            .and_then(Value::as_object),
        _ => None,
    }
}

fn direct_children<'a>(
    paths: impl Iterator<Item = &'a String>,
    namespace: Option<&str>,
) -> Vec<&'a str> {
    paths
        .filter_map(|path| match namespace {
            None => Some(path.as_str()),
            Some(ns) => path
                .strip_prefix(ns)
                .and_then(|rest| rest.strip_prefix('.')),
        })
        .filter(|name| !name.contains('.'))
        .collect()
}
