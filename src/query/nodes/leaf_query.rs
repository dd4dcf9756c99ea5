//! Leaf query - a single condition on one field

use crate::query::ast::{Boostable, QueryNode, WireFragment};
use crate::query::types::{LeafKind, EXISTS_FIELD_KEY, SCRIPT_LANG};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query holding one field/value condition
///
/// All eight single-condition kinds share this node; the kind only decides
/// how the condition is rendered and evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafQuery {
    kind: LeafKind,
    field: String,
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boost: Option<f64>,
}

impl LeafQuery {
    /// Create a leaf query of any kind
    ///
    /// Prefer the dedicated constructors; `exists` and `script` keep their
    /// payload in `value` and a fixed key in `field`.
    pub fn new(kind: LeafKind, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind,
            field: field.into(),
            value: value.into(),
            boost: None,
        }
    }

    /// Exact match on a non-analyzed value
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(LeafKind::Term, field, value)
    }

    /// Match any of several exact values
    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(LeafKind::Terms, field, Value::Array(values))
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(LeafKind::Regexp, field, pattern.into())
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(LeafKind::Wildcard, field, pattern.into())
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::new(LeafKind::Prefix, field, prefix.into())
    }

    /// Analyzed full-text match
    pub fn match_text(field: impl Into<String>, text: impl Into<Value>) -> Self {
        Self::new(LeafKind::Match, field, text)
    }

    /// Field has at least one non-null value
    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(LeafKind::Exists, EXISTS_FIELD_KEY, field.into())
    }

    /// Painless script predicate
    pub fn script(source: impl Into<String>) -> Self {
        Self::new(LeafKind::Script, LeafKind::Script.key(), source.into())
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Document field this condition inspects
    ///
    /// For `exists` this is the checked field name rather than the fixed
    /// `field` key; scripts inspect no single field.
    pub fn target_field(&self) -> Option<&str> {
        match self.kind {
            LeafKind::Exists => self.value.as_str(),
            LeafKind::Script => None,
            _ => Some(&self.field),
        }
    }

    fn render_script(&self) -> Value {
        let mut script = Map::new();
        script.insert("source".to_string(), self.value.clone());
        script.insert("lang".to_string(), Value::from(SCRIPT_LANG));

        let mut body = Map::new();
        body.insert("script".to_string(), Value::Object(script));
        if let Some(boost) = self.boost {
            body.insert("boost".to_string(), Value::from(boost));
        }
        Value::Object(body)
    }
}

/// Single-entry JSON object
pub(crate) fn object1(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

impl QueryNode for LeafQuery {
    fn finalize(&self) -> Result<WireFragment> {
        let body = match (self.kind, self.boost) {
            (LeafKind::Script, _) => self.render_script(),
            (_, None) => object1(&self.field, self.value.clone()),
            (kind, Some(boost)) => match kind.boosted_value_key() {
                Some(value_key) => {
                    let mut inner = Map::new();
                    inner.insert(value_key.to_string(), self.value.clone());
                    inner.insert("boost".to_string(), Value::from(boost));
                    object1(&self.field, Value::Object(inner))
                }
                None => {
                    let mut body = Map::new();
                    body.insert(self.field.clone(), self.value.clone());
                    body.insert("boost".to_string(), Value::from(boost));
                    Value::Object(body)
                }
            },
        };
        Ok(object1(self.kind.key(), body))
    }

    fn query_type(&self) -> &'static str {
        self.kind.key()
    }

    fn boost_factor(&self) -> Option<f64> {
        self.boost
    }

    fn is_scoring(&self) -> bool {
        !matches!(self.kind, LeafKind::Exists | LeafKind::Script)
    }
}

impl Boostable for LeafQuery {
    fn boost(&self, value: f64) -> Self {
        self.clone().with_boost(value)
    }
}
