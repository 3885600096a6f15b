//! Runs one query against the datasets listed in the settings.
//!
//! ```text
//! insight <query.json | -> [settings.json]
//! ```
//!
//! The query result is printed as a JSON array on stdout.

use std::env;
use std::fs;
use std::io;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use insight::facade::InsightFacade;
use insight::settings::Settings;
use insight::{InsightError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        let code = match e {
            InsightError::InvalidQuery(_) | InsightError::ResultTooLarge { .. } => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let query_path = args
        .next()
        .ok_or_else(|| InsightError::Config("usage: insight <query.json | -> [settings.json]".to_string()))?;
    let settings = Settings::load(args.next().as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut facade = InsightFacade::with_settings(&settings);
    for source in &settings.datasets {
        debug!(dataset = %source.id, path = %source.path.display(), "loading dataset");
        let rows: Vec<serde_json::Value> = serde_json::from_str(&fs::read_to_string(&source.path)?)?;
        facade.add_dataset(&source.id, source.kind, &rows)?;
    }
    info!(datasets = facade.list_datasets().len(), cap = settings.result_cap, "ready");

    let text = if query_path == "-" {
        io::read_to_string(io::stdin())?
    } else {
        fs::read_to_string(&query_path)?
    };
    let query: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| InsightError::invalid_query(e.to_string()))?;
    let rows = facade.perform_query(&query)?;
    let out = serde_json::to_string_pretty(&rows).map_err(|e| InsightError::Io(e.to_string()))?;
    println!("{}", out);
    Ok(())
}
