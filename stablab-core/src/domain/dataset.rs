use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Features;

/// A regression dataset: row-major features plus one target per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub feature_names: Vec<String>,
    pub features: Features,
    pub target: Vec<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset '{0}' has no rows")]
    Empty(String),
    #[error("dataset '{name}': {features} feature rows but {targets} targets")]
    LengthMismatch {
        name: String,
        features: usize,
        targets: usize,
    },
    #[error("dataset '{name}': row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        name: String,
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("dataset '{name}': non-finite value at row {row}")]
    NonFinite { name: String, row: usize },
}

impl Dataset {
    /// Build a dataset, checking shape and finiteness.
    pub fn new(
        name: impl Into<String>,
        feature_names: Vec<String>,
        features: Features,
        target: Vec<f64>,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        if features.is_empty() {
            return Err(DatasetError::Empty(name));
        }
        if features.len() != target.len() {
            return Err(DatasetError::LengthMismatch {
                name,
                features: features.len(),
                targets: target.len(),
            });
        }
        let expected = feature_names.len();
        for (row, (x, y)) in features.iter().zip(&target).enumerate() {
            if x.len() != expected {
                return Err(DatasetError::RaggedRow {
                    name,
                    row,
                    found: x.len(),
                    expected,
                });
            }
            if !y.is_finite() || x.iter().any(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite { name, row });
            }
        }
        Ok(Self {
            name,
            feature_names,
            features,
            target,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Gather the rows at `indices` (duplicates allowed, e.g. for bootstrap).
    pub fn select(&self, indices: &[usize]) -> (Features, Vec<f64>) {
        let x = indices.iter().map(|&i| self.features[i].clone()).collect();
        let y = indices.iter().map(|&i| self.target[i]).collect();
        (x, y)
    }
}
