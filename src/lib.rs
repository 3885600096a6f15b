//! Insight – an in-memory query engine over course section and campus room datasets.
//!
//! Datasets are loaded wholesale into memory and queried with JSON documents
//! of the form:
//!
//! ```json
//! {
//!     "WHERE": { "AND": [ { "GT": { "courses_avg": 90 } }, { "IS": { "courses_dept": "cp*" } } ] },
//!     "TRANSFORMATIONS": {
//!         "GROUP": ["courses_title"],
//!         "APPLY": [ { "overallAvg": { "AVG": "courses_avg" } } ]
//!     },
//!     "OPTIONS": {
//!         "COLUMNS": ["courses_title", "overallAvg"],
//!         "ORDER": { "dir": "DOWN", "keys": ["overallAvg"] }
//!     }
//! }
//! ```
//!
//! Every field is qualified with the id of its dataset (`courses_avg`), and a
//! query may only ever reference one dataset.
//!
//! ## Modules
//! * [`catalog`] – Dataset kinds, their measure and string fields, and the raw→canonical field tables.
//! * [`value`] – Scalar values, records, projected result rows and decimal arithmetic.
//! * [`store`] – Immutable [`store::Dataset`]s and the [`store::RecordStore`] keeping them.
//! * [`query`] – The typed query representation, including the WHERE filter tree.
//! * [`validator`] – Turns a raw JSON query into a [`query::ValidatedQuery`] or rejects it.
//! * [`executor`] – Evaluates WHERE, TRANSFORMATIONS and OPTIONS against a record store.
//! * [`facade`] – Dataset management and the validate-then-execute contract.
//! * [`settings`] – Runtime settings read with the `config` crate.
//!
//! ## Errors
//! Malformed queries fail with [`InsightError::InvalidQuery`] before anything
//! is executed. Valid queries matching more records than the result cap
//! (5000 unless configured) fail with [`InsightError::ResultTooLarge`].
//!
//! ## Quick Start
//! ```
//! use insight::{catalog::DatasetKind, facade::InsightFacade};
//! use serde_json::json;
//! let mut facade = InsightFacade::new();
//! facade.add_dataset("rooms", DatasetKind::Rooms, &[json!({
//!     "fullname": "Hugh Dempster Pavilion", "shortname": "DMP", "number": "110",
//!     "address": "6245 Agronomy Road V6T 1Z4", "lat": 49.26125, "lon": -123.24807,
//!     "seats": 120, "type": "Tiered Large Group", "furniture": "Classroom-Fixed Tablets",
//!     "href": "http://students.ubc.ca/campus/discover/buildings-and-classrooms/room/DMP-110"
//! })]).unwrap();
//! let rows = facade.perform_query(&json!({
//!     "WHERE": { "GT": { "rooms_seats": 100 } },
//!     "OPTIONS": { "COLUMNS": ["rooms_name"] }
//! })).unwrap();
//! assert_eq!(rows[0].get("rooms_name").unwrap().as_text(), Some("DMP_110"));
//! ```

pub mod catalog;
pub mod error;
pub mod executor;
pub mod facade;
pub mod query;
pub mod settings;
pub mod store;
pub mod validator;
pub mod value;

pub use error::{InsightError, Result};
