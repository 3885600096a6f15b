//! Runtime settings, read with the `config` crate.
//!
//! Sources are layered: built-in defaults, then an optional JSON file
//! (`insight.json` unless another path is given), then environment variables
//! prefixed with `INSIGHT_`, e.g. `INSIGHT_RESULT_CAP=2000`.
//!
//! ```json
//! {
//!     "result_cap": 5000,
//!     "log_filter": "insight=debug",
//!     "datasets": [
//!         { "id": "courses", "kind": "courses", "path": "data/courses.json" },
//!         { "id": "rooms", "kind": "rooms", "path": "data/rooms.json" }
//!     ]
//! }
//! ```

use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::catalog::DatasetKind;
use crate::error::{InsightError, Result};
use crate::executor::DEFAULT_RESULT_CAP;

pub const DEFAULT_SETTINGS_FILE: &str = "insight.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub result_cap: usize,
    pub log_filter: String,
    #[serde(default)]
    pub datasets: Vec<DatasetSource>,
}

/// A JSON file holding an array of raw rows for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetSource {
    pub id: String,
    pub kind: DatasetKind,
    pub path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            result_cap: DEFAULT_RESULT_CAP,
            log_filter: "info".to_string(),
            datasets: Vec::new(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (optional on disk) and the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("result_cap", DEFAULT_RESULT_CAP as u64)?
            .set_default("log_filter", "info")?
            .add_source(File::new(path.unwrap_or(DEFAULT_SETTINGS_FILE), FileFormat::Json).required(path.is_some()))
            .add_source(Environment::with_prefix("INSIGHT"))
            .build()?
            .try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    /// Loads settings from a JSON string, used by tests and embedders.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("result_cap", DEFAULT_RESULT_CAP as u64)?
            .set_default("log_filter", "info")?
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?
            .try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<()> {
        if self.result_cap == 0 {
            return Err(InsightError::Config("result_cap must be positive".to_string()));
        }
        Ok(())
    }
}
