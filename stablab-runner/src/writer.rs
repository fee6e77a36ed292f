//! Results export: a JSON document plus a flat CSV companion.
//!
//! Both files are keyed by (model, dataset) and overwritten on every run:
//! - `<results>/<model>_<dataset>_stability.json`
//! - `<results>/<model>_<dataset>_stability.csv` with columns
//!   `section, aggregation, metric, value`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stablab_core::ModelKey;
use thiserror::Error;
use tracing::info;

use crate::analyzer::StabilityReport;
use crate::comparator::ComparisonReport;
use crate::ensemble::SCHEMA_VERSION;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Full results of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityResults {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub model_key: ModelKey,
    pub dataset_name: String,
    pub ensemble_size: usize,
    pub stability: Vec<StabilityReport>,
    pub comparison: ComparisonReport,
}

impl StabilityResults {
    pub fn new(
        model_key: ModelKey,
        dataset_name: impl Into<String>,
        ensemble_size: usize,
        stability: Vec<StabilityReport>,
        comparison: ComparisonReport,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            model_key,
            dataset_name: dataset_name.into(),
            ensemble_size,
            stability,
            comparison,
        }
    }
}

/// Paths written by [`write_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

pub fn result_stem(key: &ModelKey, dataset: &str) -> String {
    format!("{}_{}_stability", key.slug(), dataset)
}

pub fn export_json(results: &StabilityResults) -> Result<String, WriterError> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Parse a results document, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<StabilityResults, WriterError> {
    let results: StabilityResults = serde_json::from_str(json)?;
    if results.schema_version > SCHEMA_VERSION {
        return Err(WriterError::UnsupportedSchema {
            found: results.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(results)
}

/// Flatten reports into `section, aggregation, metric, value` rows.
///
/// Comparison entries that are not applicable have an empty value.
pub fn export_csv(results: &StabilityResults) -> Result<String, WriterError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["section", "aggregation", "metric", "value"])?;

    for report in &results.stability {
        for (metric, value) in &report.metrics {
            let value = value.to_string();
            wtr.write_record([
                "stability",
                report.aggregation.as_str(),
                metric.as_str(),
                value.as_str(),
            ])?;
        }
    }

    let pair_count = results.comparison.pair_count.to_string();
    wtr.write_record(["comparison", "", "pair_count", pair_count.as_str()])?;
    for (aggregation, value) in &results.comparison.distances {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record(["comparison", aggregation.as_str(), "distance", value.as_str()])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| WriterError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the JSON and CSV results under `dir`, creating it if needed.
pub fn write_results(results: &StabilityResults, dir: &Path) -> Result<ResultPaths, WriterError> {
    std::fs::create_dir_all(dir).map_err(|source| WriterError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let stem = result_stem(&results.model_key, &results.dataset_name);
    let paths = ResultPaths {
        json: dir.join(format!("{stem}.json")),
        csv: dir.join(format!("{stem}.csv")),
    };

    for (path, content) in [
        (&paths.json, export_json(results)?),
        (&paths.csv, export_csv(results)?),
    ] {
        std::fs::write(path, content).map_err(|source| WriterError::Io {
            path: path.clone(),
            source,
        })?;
    }
    info!(json = %paths.json.display(), csv = %paths.csv.display(), "results written");
    Ok(paths)
}
