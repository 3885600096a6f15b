//! In-memory datasets and the keeper that owns them.
//!
//! A [`Dataset`] is built once, either from records that are already
//! qualified or from raw rows as they come out of the external ingestion
//! layer, and is never mutated afterwards. The [`RecordStore`] keeps datasets
//! behind `Arc` so a query can hold on to one while the store changes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Map;
use tracing::{info, warn};

use crate::catalog::{qualify, split_qualified_key, DatasetCatalog, DatasetInfo, DatasetKind, FieldType};
use crate::error::{InsightError, Result};
use crate::value::{FieldHasher, Record, Value};

/// Sections flagged as "overall" aggregate every year and get this year.
pub const OVERALL_YEAR: f64 = 1900.0;

/// Ids must be non-empty, not whitespace only, and free of underscores since
/// the underscore separates the id from the field in qualified keys.
pub fn validate_dataset_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(InsightError::InvalidDataset(format!(
            "dataset id '{}' is empty or whitespace",
            id
        )));
    }
    if id.contains('_') {
        return Err(InsightError::InvalidDataset(format!(
            "dataset id '{}' contains an underscore",
            id
        )));
    }
    Ok(())
}

// ------------- Dataset -------------
#[derive(Debug)]
pub struct Dataset {
    id: String,
    kind: DatasetKind,
    records: Vec<Record>,
}

impl Dataset {
    /// Creates a dataset from records whose keys are already qualified with
    /// `id`. Every key must name a field of `kind` and carry a value of the
    /// matching type.
    pub fn new(id: impl Into<String>, kind: DatasetKind, records: Vec<Record>) -> Result<Self> {
        let id = id.into();
        validate_dataset_id(&id)?;
        for (position, record) in records.iter().enumerate() {
            for (key, value) in record {
                let field = match split_qualified_key(key) {
                    Some((dataset, field)) if dataset == id => field,
                    _ => {
                        return Err(InsightError::InvalidDataset(format!(
                            "record {} has key '{}' not qualified with '{}'",
                            position, key, id
                        )));
                    }
                };
                let matches_type = match (kind.field_type(field), value) {
                    (Some(FieldType::Measure), Value::Number(_)) => true,
                    (Some(FieldType::Text), Value::Text(_)) => true,
                    _ => false,
                };
                if !matches_type {
                    return Err(InsightError::InvalidDataset(format!(
                        "record {} has invalid field '{}' for a {} dataset",
                        position, key, kind
                    )));
                }
            }
        }
        Ok(Self { id, kind, records })
    }

    /// Converts raw rows into qualified records, skipping rows that lack a
    /// field or carry one of the wrong type. A dataset left without any valid
    /// row is rejected.
    pub fn from_rows(id: impl Into<String>, kind: DatasetKind, rows: &[serde_json::Value]) -> Result<Self> {
        let id = id.into();
        validate_dataset_id(&id)?;
        let mut records = Vec::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let converted = row.as_object().and_then(|row| match kind {
                DatasetKind::Courses => convert_section(&id, row),
                DatasetKind::Rooms => convert_room(&id, row),
            });
            match converted {
                Some(record) => records.push(record),
                None => warn!(dataset = %id, position, "skipping invalid row"),
            }
        }
        if records.is_empty() {
            return Err(InsightError::InvalidDataset(format!(
                "dataset '{}' contains no valid {} rows",
                id, kind
            )));
        }
        info!(dataset = %id, %kind, kept = records.len(), skipped = rows.len() - records.len(), "rows converted");
        Ok(Self { id, kind, records })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn kind(&self) -> DatasetKind {
        self.kind
    }
    pub fn records(&self) -> &[Record] {
        &self.records
    }
    pub fn record(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo::new(self.id.clone(), self.kind, self.records.len())
    }
}

fn convert_section(id: &str, section: &Map<String, serde_json::Value>) -> Option<Record> {
    let kind = DatasetKind::Courses;
    let overall = section
        .get("Section")
        .and_then(|s| s.as_str())
        .is_some_and(|s| s.eq_ignore_ascii_case("overall"));
    let mut record = Record::default();
    for (source, canonical) in kind.source_fields() {
        let raw = section.get(*source)?;
        let value = match *source {
            // the raw year is text, the raw uuid is a number
            "Year" => {
                let year = raw.as_str()?;
                if overall {
                    Value::Number(OVERALL_YEAR)
                } else {
                    Value::Number(year.trim().parse::<f64>().ok()?)
                }
            }
            "id" => match raw {
                serde_json::Value::Number(n) => Value::Text(n.to_string()),
                _ => return None,
            },
            _ => typed_value(kind, canonical, raw)?,
        };
        record.insert(qualify(id, canonical), value);
    }
    Some(record)
}

fn convert_room(id: &str, room: &Map<String, serde_json::Value>) -> Option<Record> {
    let kind = DatasetKind::Rooms;
    let mut record = Record::default();
    for (source, canonical) in kind.source_fields() {
        let value = typed_value(kind, canonical, room.get(*source)?)?;
        record.insert(qualify(id, canonical), value);
    }
    let shortname = room.get("shortname")?.as_str()?;
    let number = room.get("number")?.as_str()?;
    record.insert(qualify(id, "name"), Value::Text(format!("{}_{}", shortname, number)));
    Some(record)
}

fn typed_value(kind: DatasetKind, field: &str, raw: &serde_json::Value) -> Option<Value> {
    match (kind.field_type(field)?, raw) {
        (FieldType::Measure, serde_json::Value::Number(n)) => n.as_f64().map(Value::Number),
        (FieldType::Text, serde_json::Value::String(s)) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

// ------------- RecordStore -------------
/// Owns every loaded dataset, keyed by id, remembering load order.
#[derive(Debug, Default)]
pub struct RecordStore {
    kept: HashMap<String, Arc<Dataset>, FieldHasher>,
    order: Vec<String>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn keep(&mut self, dataset: Dataset) -> Result<Arc<Dataset>> {
        if self.kept.contains_key(dataset.id()) {
            return Err(InsightError::InvalidDataset(format!(
                "dataset '{}' already exists",
                dataset.id()
            )));
        }
        let id = dataset.id().to_owned();
        let kept = Arc::new(dataset);
        self.kept.insert(id.clone(), Arc::clone(&kept));
        self.order.push(id);
        Ok(kept)
    }
    pub fn release(&mut self, id: &str) -> Option<Arc<Dataset>> {
        let released = self.kept.remove(id)?;
        self.order.retain(|kept_id| kept_id != id);
        Some(released)
    }
    pub fn get(&self, id: &str) -> Option<Arc<Dataset>> {
        self.kept.get(id).map(Arc::clone)
    }
    pub fn contains(&self, id: &str) -> bool {
        self.kept.contains_key(id)
    }
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }
    pub fn infos(&self) -> Vec<DatasetInfo> {
        self.order
            .iter()
            .filter_map(|id| self.kept.get(id))
            .map(|dataset| dataset.info())
            .collect()
    }
    /// The catalog of everything currently kept, as seen by the validator.
    pub fn catalog(&self) -> DatasetCatalog {
        DatasetCatalog::new(self.infos())
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
