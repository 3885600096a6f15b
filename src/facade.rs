//! The calling surface: dataset management plus the validate-then-execute
//! query contract.

use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::{DatasetInfo, DatasetKind};
use crate::error::{InsightError, Result};
use crate::executor::{QueryExecutor, DEFAULT_RESULT_CAP};
use crate::settings::Settings;
use crate::store::{validate_dataset_id, Dataset, RecordStore};
use crate::validator::QueryValidator;
use crate::value::ResultRow;

pub struct InsightFacade {
    store: RecordStore,
    result_cap: usize,
}

impl Default for InsightFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightFacade {
    pub fn new() -> Self {
        Self {
            store: RecordStore::new(),
            result_cap: DEFAULT_RESULT_CAP,
        }
    }
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            store: RecordStore::new(),
            result_cap: settings.result_cap,
        }
    }
    pub fn with_result_cap(mut self, result_cap: usize) -> Self {
        self.result_cap = result_cap;
        self
    }
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Converts raw rows into a new dataset and keeps it. Returns the ids of
    /// every loaded dataset.
    pub fn add_dataset(&mut self, id: &str, kind: DatasetKind, rows: &[Value]) -> Result<Vec<String>> {
        validate_dataset_id(id)?;
        if self.store.contains(id) {
            return Err(InsightError::InvalidDataset(format!("dataset '{}' already exists", id)));
        }
        let dataset = Dataset::from_rows(id, kind, rows)?;
        self.keep(dataset)
    }

    /// Keeps a dataset built elsewhere, e.g. from already qualified records.
    pub fn keep(&mut self, dataset: Dataset) -> Result<Vec<String>> {
        let kept = self.store.keep(dataset)?;
        info!(dataset = kept.id(), kind = %kept.kind(), rows = kept.len(), "dataset added");
        Ok(self.store.ids())
    }

    pub fn remove_dataset(&mut self, id: &str) -> Result<String> {
        validate_dataset_id(id)?;
        match self.store.release(id) {
            Some(released) => {
                info!(dataset = released.id(), "dataset removed");
                Ok(id.to_owned())
            }
            None => Err(InsightError::NotFound(id.to_owned())),
        }
    }

    pub fn list_datasets(&self) -> Vec<DatasetInfo> {
        self.store.infos()
    }

    /// Validates the query against the loaded datasets, then executes it.
    pub fn perform_query(&self, query: &Value) -> Result<Vec<ResultRow>> {
        let started = Instant::now();
        let catalog = self.store.catalog();
        let result = QueryValidator::new(&catalog).validate(query).and_then(|validated| {
            QueryExecutor::new(&self.store)
                .with_cap(self.result_cap)
                .execute(&validated)
        });
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(rows) => info!(ms = elapsed_ms, rows = rows.len(), "query complete"),
            Err(e) => warn!(ms = elapsed_ms, error = %e, "query rejected"),
        }
        result
    }
}
