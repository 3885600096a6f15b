//! The field catalog: which fields exist for each dataset kind, and how the
//! raw source names of ingested rows translate to the canonical field names
//! used in queries.
//!
//! Every field referenced by a query is *qualified* with the id of the dataset
//! it belongs to, as in `courses_avg` or `rooms_seats`. The part before the
//! single underscore is the dataset id and the part after it is the field.

use std::fmt;

// used to translate raw source field names into canonical names and back
use bimap::BiMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Courses,
    Rooms,
}

/// Measure fields hold numbers, text fields hold strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Measure,
    Text,
}

const COURSES_MEASURES: &[&str] = &["avg", "pass", "fail", "audit", "year"];
const COURSES_STRINGS: &[&str] = &["dept", "id", "instructor", "title", "uuid"];
const ROOMS_MEASURES: &[&str] = &["lat", "lon", "seats"];
const ROOMS_STRINGS: &[&str] = &[
    "fullname",
    "shortname",
    "number",
    "name",
    "address",
    "type",
    "furniture",
    "href",
];

lazy_static! {
    // exactly one underscore, either side may be empty (and then fails later)
    static ref QUALIFIED_KEY: Regex = Regex::new(r"^([^_]*)_([^_]*)$").unwrap();
    // left: name found in the raw section files, right: canonical field
    static ref COURSES_SOURCE_FIELDS: BiMap<&'static str, &'static str> = [
        ("Subject", "dept"),
        ("Course", "id"),
        ("Avg", "avg"),
        ("Professor", "instructor"),
        ("Title", "title"),
        ("Pass", "pass"),
        ("Fail", "fail"),
        ("Audit", "audit"),
        ("id", "uuid"),
        ("Year", "year"),
    ]
    .into_iter()
    .collect();
    // rooms are scraped with canonical names already, "name" is derived
    static ref ROOMS_SOURCE_FIELDS: BiMap<&'static str, &'static str> = [
        ("fullname", "fullname"),
        ("shortname", "shortname"),
        ("number", "number"),
        ("address", "address"),
        ("lat", "lat"),
        ("lon", "lon"),
        ("seats", "seats"),
        ("type", "type"),
        ("furniture", "furniture"),
        ("href", "href"),
    ]
    .into_iter()
    .collect();
}

impl DatasetKind {
    pub fn measure_fields(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Courses => COURSES_MEASURES,
            DatasetKind::Rooms => ROOMS_MEASURES,
        }
    }
    pub fn string_fields(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Courses => COURSES_STRINGS,
            DatasetKind::Rooms => ROOMS_STRINGS,
        }
    }
    pub fn field_type(self, field: &str) -> Option<FieldType> {
        if self.measure_fields().contains(&field) {
            Some(FieldType::Measure)
        } else if self.string_fields().contains(&field) {
            Some(FieldType::Text)
        } else {
            None
        }
    }
    /// The bidirectional table between raw source names and canonical names.
    pub fn source_fields(self) -> &'static BiMap<&'static str, &'static str> {
        match self {
            DatasetKind::Courses => &*COURSES_SOURCE_FIELDS,
            DatasetKind::Rooms => &*ROOMS_SOURCE_FIELDS,
        }
    }
    pub fn canonical_field(self, source: &str) -> Option<&'static str> {
        self.source_fields().get_by_left(source).copied()
    }
    pub fn source_field(self, canonical: &str) -> Option<&'static str> {
        self.source_fields().get_by_right(canonical).copied()
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatasetKind::Courses => write!(f, "courses"),
            DatasetKind::Rooms => write!(f, "rooms"),
        }
    }
}

/// Splits `<datasetId>_<field>` into its two halves. Keys with no underscore
/// or more than one underscore do not split.
pub fn split_qualified_key(key: &str) -> Option<(&str, &str)> {
    let captures = QUALIFIED_KEY.captures(key)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

pub fn qualify(dataset: &str, field: &str) -> String {
    format!("{}_{}", dataset, field)
}

/// Metadata about one loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub kind: DatasetKind,
    #[serde(rename = "numRows")]
    pub num_rows: usize,
}

impl DatasetInfo {
    pub fn new(id: impl Into<String>, kind: DatasetKind, num_rows: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            num_rows,
        }
    }
}

/// The known datasets a query may refer to, in the order they were loaded.
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    datasets: Vec<DatasetInfo>,
}

impl DatasetCatalog {
    pub fn new(datasets: Vec<DatasetInfo>) -> Self {
        Self { datasets }
    }
    pub fn resolve_kind(&self, id: &str) -> Option<DatasetKind> {
        self.datasets.iter().find(|d| d.id == id).map(|d| d.kind)
    }
    pub fn contains(&self, id: &str) -> bool {
        self.resolve_kind(id).is_some()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, DatasetInfo> {
        self.datasets.iter()
    }
    pub fn len(&self) -> usize {
        self.datasets.len()
    }
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl From<Vec<DatasetInfo>> for DatasetCatalog {
    fn from(datasets: Vec<DatasetInfo>) -> Self {
        Self::new(datasets)
    }
}
