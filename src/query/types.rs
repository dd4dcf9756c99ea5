//! Core types for the query algebra

use serde::{Deserialize, Serialize};
use std::fmt;

/// Script language used for every `script` query
pub const SCRIPT_LANG: &str = "painless";

/// Key under which an `exists` query stores the checked field name
pub const EXISTS_FIELD_KEY: &str = "field";

/// Clause group of a boolean query
///
/// The variant order is also the order in which clause groups are visited
/// when a bool query is rendered or evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    /// Must match, contributes to score
    Must,
    /// Must match, ignored for scoring
    Filter,
    /// Optional unless there are no must/filter clauses
    Should,
    /// Must not match, ignored for scoring
    MustNot,
}

impl ClauseKind {
    /// All clause kinds in rendering order
    pub const ALL: [ClauseKind; 4] = [
        ClauseKind::Must,
        ClauseKind::Filter,
        ClauseKind::Should,
        ClauseKind::MustNot,
    ];

    /// Wire-format key of this clause group
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseKind::Must => "must",
            ClauseKind::Filter => "filter",
            ClauseKind::Should => "should",
            ClauseKind::MustNot => "must_not",
        }
    }

    /// Resolve a wire-format key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "must" => Some(ClauseKind::Must),
            "filter" => Some(ClauseKind::Filter),
            "should" => Some(ClauseKind::Should),
            "must_not" => Some(ClauseKind::MustNot),
            _ => None,
        }
    }

    /// Whether clauses of this kind add to the relevance score
    pub fn is_scoring(&self) -> bool {
        matches!(self, ClauseKind::Must | ClauseKind::Should)
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a single-condition query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafKind {
    /// Exact term, field not analyzed
    Term,
    /// Any of several exact terms
    Terms,
    /// Regular expression over terms
    Regexp,
    /// `*` / `?` wildcard expression
    Wildcard,
    /// Term prefix
    Prefix,
    /// Analyzed full-text match
    Match,
    /// Field has an indexed value
    Exists,
    /// Painless script predicate
    Script,
}

impl LeafKind {
    /// Wire-format key of this query kind
    pub fn key(&self) -> &'static str {
        match self {
            LeafKind::Term => "term",
            LeafKind::Terms => "terms",
            LeafKind::Regexp => "regexp",
            LeafKind::Wildcard => "wildcard",
            LeafKind::Prefix => "prefix",
            LeafKind::Match => "match",
            LeafKind::Exists => "exists",
            LeafKind::Script => "script",
        }
    }

    /// Resolve a wire-format key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "term" => Some(LeafKind::Term),
            "terms" => Some(LeafKind::Terms),
            "regexp" => Some(LeafKind::Regexp),
            "wildcard" => Some(LeafKind::Wildcard),
            "prefix" => Some(LeafKind::Prefix),
            "match" => Some(LeafKind::Match),
            "exists" => Some(LeafKind::Exists),
            "script" => Some(LeafKind::Script),
            _ => None,
        }
    }

    /// Key wrapping the value in the boosted `{field: {<key>: value, boost}}` shape
    ///
    /// Returns `None` for kinds whose boost is a sibling of the field instead.
    pub fn boosted_value_key(&self) -> Option<&'static str> {
        match self {
            LeafKind::Term | LeafKind::Regexp | LeafKind::Wildcard | LeafKind::Prefix => {
                Some("value")
            }
            LeafKind::Match => Some("query"),
            LeafKind::Terms | LeafKind::Exists | LeafKind::Script => None,
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Comparison operator of a range query
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
}

impl RangeOp {
    /// All operators in wire order
    pub const ALL: [RangeOp; 4] = [RangeOp::Gt, RangeOp::Gte, RangeOp::Lt, RangeOp::Lte];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "gt" => Some(RangeOp::Gt),
            "gte" => Some(RangeOp::Gte),
            "lt" => Some(RangeOp::Lt),
            "lte" => Some(RangeOp::Lte),
            _ => None,
        }
    }

    /// Check whether `ordering` (document value compared to the bound) satisfies this operator
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            RangeOp::Gt => ordering == Greater,
            RangeOp::Gte => ordering != Less,
            RangeOp::Lt => ordering == Less,
            RangeOp::Lte => ordering != Greater,
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
