//! Dataset provider trait and the standard built-in + CSV implementation.
//!
//! The DatasetProvider trait abstracts over dataset sources so the pipeline can
//! be driven by fixtures in tests and by files on disk in production.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::synthetic;
use crate::domain::{Dataset, DatasetError};

/// Default number of rows generated for built-in datasets.
pub const DEFAULT_SYNTHETIC_ROWS: usize = 200;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset not found: '{name}'")]
    DatasetNotFound { name: String },

    #[error("failed to read '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{path}' line {line}, column '{column}': cannot parse '{value}' as a number")]
    Parse {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
    },

    #[error("'{path}' needs at least one feature column and one target column")]
    TooFewColumns { path: PathBuf },

    #[error(transparent)]
    Invalid(#[from] DatasetError),
}

/// Source of named datasets.
pub trait DatasetProvider: Send + Sync {
    /// Load a dataset by name.
    fn get_dataset(&self, name: &str) -> Result<Dataset, DataError>;

    /// Known dataset names, sorted.
    fn list_datasets(&self) -> Vec<String>;
}

/// Built-in synthetic datasets plus `<datasets_path>/<name>.csv` files.
///
/// CSV layout: a header row, numeric columns, the last column is the target.
/// A CSV file shadows a built-in dataset of the same name.
#[derive(Debug, Clone)]
pub struct StandardDatasetProvider {
    datasets_path: PathBuf,
    synthetic_rows: usize,
}

impl StandardDatasetProvider {
    pub fn new(datasets_path: impl AsRef<Path>) -> Self {
        Self {
            datasets_path: datasets_path.as_ref().to_path_buf(),
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
        }
    }

    pub fn with_synthetic_rows(mut self, rows: usize) -> Self {
        self.synthetic_rows = rows;
        self
    }

    fn csv_path(&self, name: &str) -> PathBuf {
        self.datasets_path.join(format!("{name}.csv"))
    }

    fn csv_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.datasets_path) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("csv")
            })
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect()
    }
}

impl DatasetProvider for StandardDatasetProvider {
    fn get_dataset(&self, name: &str) -> Result<Dataset, DataError> {
        let path = self.csv_path(name);
        if !name.is_empty() && path.is_file() {
            return read_csv_dataset(name, &path);
        }
        match synthetic::generate(name, self.synthetic_rows) {
            Some(dataset) => Ok(dataset?),
            None => Err(DataError::DatasetNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn list_datasets(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = synthetic::BUILTIN_DATASETS
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(self.csv_names());
        names.into_iter().collect()
    }
}

/// Read a numeric CSV whose last column is the regression target.
pub fn read_csv_dataset(name: &str, path: &Path) -> Result<Dataset, DataError> {
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.len() < 2 {
        return Err(DataError::TooFewColumns {
            path: path.to_path_buf(),
        });
    }
    let n_features = headers.len() - 1;

    let mut features = Vec::new();
    let mut target = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let mut values = Vec::with_capacity(headers.len());
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| DataError::Parse {
                path: path.to_path_buf(),
                // header is line 1
                line: row_idx + 2,
                column: headers.get(col).cloned().unwrap_or_else(|| col.to_string()),
                value: field.to_string(),
            })?;
            values.push(value);
        }
        let y = values.pop().unwrap_or(f64::NAN);
        features.push(values);
        target.push(y);
    }

    let feature_names = headers[..n_features].to_vec();
    Ok(Dataset::new(name, feature_names, features, target)?)
}
