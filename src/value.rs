// used to print out readable forms of a value
use std::fmt;
// used to compare values when ordering results
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
// used to overload common operations for decimals
use std::ops;
// used when parsing the decimal text of a number
use std::str::FromStr;

// used for decimal-safe accumulation
use bigdecimal::{BigDecimal, RoundingMode};
use seahash::SeaHasher;
use serde::ser::{Serialize, SerializeMap, Serializer};

pub type FieldHasher = BuildHasherDefault<SeaHasher>;

/// A record maps fully qualified field names to scalar values.
pub type Record = HashMap<String, Value, FieldHasher>;

// ------------- Value -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
    /// Numbers compare numerically, strings lexicographically, and any
    /// number sorts before any string.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        }
    }
}

// whole numbers are written without a fraction, as 2015 rather than 2015.0
const LARGEST_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= LARGEST_EXACT_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

// ------------- ResultRow -------------
/// A projected output record. Columns keep the order they were requested in,
/// also when serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    columns: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.columns.push((key.into(), value));
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
    pub fn keys(&self) -> Vec<&str> {
        self.columns.iter().map(|(k, _)| k.as_str()).collect()
    }
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }
    pub fn len(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (key, value) in &self.columns {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ------------- Decimal -------------
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug, Default)]
pub struct Decimal(BigDecimal);

impl Decimal {
    /// Builds the decimal from the shortest text that round-trips the
    /// number, so 1.005 is 1.005 and not its binary approximation.
    pub fn from_f64(n: f64) -> Option<Decimal> {
        if !n.is_finite() {
            return None;
        }
        BigDecimal::from_str(&n.to_string()).ok().map(Decimal)
    }
    pub fn from_count(n: usize) -> Decimal {
        Decimal(BigDecimal::from(n as u64))
    }
    /// Rounds half away from zero to the given number of decimal places.
    pub fn round_to(&self, places: i64) -> Decimal {
        Decimal(self.0.with_scale_round(places, RoundingMode::HalfUp))
    }
    pub fn to_f64(&self) -> Option<f64> {
        // parsing the decimal text rounds correctly to the nearest f64
        self.0.to_string().parse::<f64>().ok()
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Add for Decimal {
    type Output = Decimal;
    fn add(self, other: Decimal) -> Decimal {
        Decimal(self.0 + other.0)
    }
}
impl ops::Div for Decimal {
    type Output = Decimal;
    fn div(self, other: Decimal) -> Decimal {
        Decimal(self.0 / other.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
