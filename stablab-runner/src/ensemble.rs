//! Ensemble of trained model instances produced by one training grid.

use serde::{Deserialize, Serialize};
use stablab_core::{FittedModel, ModelKey};

/// Schema version of stored ensembles and result documents.
pub const SCHEMA_VERSION: u32 = 1;

/// One `(split, iteration, preprocessing variant)` combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub split_index: usize,
    pub iteration_index: usize,
    pub variant_index: usize,
}

/// Grid dimensions `S × I × K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub splits: usize,
    pub iterations: usize,
    pub variants: usize,
}

impl GridShape {
    pub fn new(splits: usize, iterations: usize, variants: usize) -> Self {
        Self {
            splits,
            iterations,
            variants,
        }
    }

    pub fn size(&self) -> usize {
        self.splits * self.iterations * self.variants
    }

    /// All cells, split-major, then iteration, then variant.
    pub fn cells(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(self.size());
        for split_index in 0..self.splits {
            for iteration_index in 0..self.iterations {
                for variant_index in 0..self.variants {
                    cells.push(GridCell {
                        split_index,
                        iteration_index,
                        variant_index,
                    });
                }
            }
        }
        cells
    }
}

/// A model trained for one grid cell together with its held-out results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedInstance {
    pub cell: GridCell,
    /// Name of the preprocessing variant applied.
    pub preprocessing: String,
    pub model: FittedModel,
    /// Training rows actually fitted on (after resampling, may repeat).
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
    pub predictions: Vec<f64>,
    pub test_targets: Vec<f64>,
}

impl TrainedInstance {
    pub fn test_mse(&self) -> Option<f64> {
        if self.predictions.is_empty() || self.predictions.len() != self.test_targets.len() {
            return None;
        }
        let sse: f64 = self
            .predictions
            .iter()
            .zip(&self.test_targets)
            .map(|(p, y)| (p - y).powi(2))
            .sum();
        Some(sse / self.predictions.len() as f64)
    }

    /// Coefficient of determination on the held-out rows. `None` when the
    /// held-out targets have no variance.
    pub fn test_r2(&self) -> Option<f64> {
        let mse = self.test_mse()?;
        let n = self.test_targets.len() as f64;
        let mean = self.test_targets.iter().sum::<f64>() / n;
        let var = self.test_targets.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n;
        if var <= f64::EPSILON {
            return None;
        }
        Some(1.0 - mse / var)
    }
}

/// All instances of one run, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub schema_version: u32,
    pub model_key: ModelKey,
    pub dataset_name: String,
    pub shape: GridShape,
    pub seed: u64,
    pub instances: Vec<TrainedInstance>,
}

impl Ensemble {
    pub fn new(
        model_key: ModelKey,
        dataset_name: impl Into<String>,
        shape: GridShape,
        seed: u64,
        instances: Vec<TrainedInstance>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            model_key,
            dataset_name: dataset_name.into(),
            shape,
            seed,
            instances,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Number of unordered instance pairs.
    pub fn pair_count(&self) -> usize {
        let n = self.len();
        n * n.saturating_sub(1) / 2
    }
}
