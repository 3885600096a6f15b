//! Typed query representation.
//!
//! The validator turns a raw JSON query document into these structures, so
//! the executor never has to look at untyped JSON. Field keys stay fully
//! qualified (`courses_avg`) since that is also how records are keyed.

use std::fmt;

use crate::catalog::DatasetKind;

/// A node of the WHERE filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every child must match
    And(Vec<Filter>),
    /// At least one child must match
    Or(Vec<Filter>),
    /// The child must not match
    Not(Box<Filter>),
    /// Measure field greater than a number
    Gt(Comparison),
    /// Measure field less than a number
    Lt(Comparison),
    /// Measure field equal to a number
    Eq(Comparison),
    /// String field matching a wildcard pattern
    Is(Matcher),
}

impl Filter {
    pub fn op_name(&self) -> &'static str {
        match self {
            Filter::And(_) => "AND",
            Filter::Or(_) => "OR",
            Filter::Not(_) => "NOT",
            Filter::Gt(_) => "GT",
            Filter::Lt(_) => "LT",
            Filter::Eq(_) => "EQ",
            Filter::Is(_) => "IS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub key: String,
    pub value: f64,
}

impl Comparison {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub key: String,
    pub pattern: Pattern,
}

/// An IS pattern. `*` may only appear as the first and/or last character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl Pattern {
    /// Returns `None` when a wildcard appears anywhere but the ends.
    pub fn parse(raw: &str) -> Option<Pattern> {
        let mut interior = raw.chars();
        interior.next();
        interior.next_back();
        if interior.as_str().contains('*') {
            return None;
        }
        let pattern = match (raw.strip_prefix('*'), raw.strip_suffix('*')) {
            (Some(_), Some(_)) => Pattern::Contains(interior.as_str().to_owned()),
            (Some(rest), None) => Pattern::Suffix(rest.to_owned()),
            (None, Some(rest)) => Pattern::Prefix(rest.to_owned()),
            (None, None) => Pattern::Exact(raw.to_owned()),
        };
        Some(pattern)
    }
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Exact(s) => candidate == s,
            Pattern::Prefix(s) => candidate.starts_with(s.as_str()),
            Pattern::Suffix(s) => candidate.ends_with(s.as_str()),
            Pattern::Contains(s) => candidate.contains(s.as_str()),
        }
    }
}

// ------------- Transformations -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Transformations {
    pub group: Vec<String>,
    pub apply: Vec<ApplyRule>,
}

/// `{name: {TOKEN: key}}`
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRule {
    pub name: String,
    pub token: ApplyToken,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyToken {
    Max,
    Min,
    Avg,
    Sum,
    Count,
}

impl ApplyToken {
    pub fn parse(token: &str) -> Option<ApplyToken> {
        match token {
            "MAX" => Some(ApplyToken::Max),
            "MIN" => Some(ApplyToken::Min),
            "AVG" => Some(ApplyToken::Avg),
            "SUM" => Some(ApplyToken::Sum),
            "COUNT" => Some(ApplyToken::Count),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyToken::Max => "MAX",
            ApplyToken::Min => "MIN",
            ApplyToken::Avg => "AVG",
            ApplyToken::Sum => "SUM",
            ApplyToken::Count => "COUNT",
        }
    }
    /// Only COUNT can target a string field.
    pub fn needs_measure(&self) -> bool {
        !matches!(self, ApplyToken::Count)
    }
}

impl fmt::Display for ApplyToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ------------- Options -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub columns: Vec<String>,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// A single key, ascending
    Key(String),
    /// Several keys as successive tie-breakers, in one direction
    Keys { direction: Direction, keys: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(dir: &str) -> Option<Direction> {
        match dir {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            _ => None,
        }
    }
}

// ------------- Query -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `None` when WHERE is empty and every record matches
    pub filter: Option<Filter>,
    pub transformations: Option<Transformations>,
    pub options: Options,
}

/// A query that passed validation, together with what validation resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    pub query: Query,
    pub dataset: String,
    pub kind: DatasetKind,
    /// Keys accepted as columns, in COLUMNS order
    pub projection_keys: Vec<String>,
}
