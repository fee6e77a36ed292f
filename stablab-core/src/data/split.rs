//! Reproducible train/test partitions and bootstrap resampling.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TEST_FRACTION: f64 = 0.25;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("test fraction must lie strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),
    #[error("cannot split {0} rows into two non-empty partitions")]
    TooFewRows(usize),
}

/// Row indices of one train/test partition, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles row indices and cuts off a test fraction.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    test_fraction: f64,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
        }
    }
}

impl Splitter {
    pub fn new(test_fraction: f64) -> Result<Self, SplitError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(SplitError::InvalidFraction(test_fraction));
        }
        Ok(Self { test_fraction })
    }

    /// Number of test rows for `n_rows`, clamped so both sides keep a row.
    pub fn test_size(&self, n_rows: usize) -> Result<usize, SplitError> {
        if n_rows < 2 {
            return Err(SplitError::TooFewRows(n_rows));
        }
        let raw = (n_rows as f64 * self.test_fraction).round() as usize;
        Ok(raw.clamp(1, n_rows - 1))
    }

    pub fn partition<R: Rng + ?Sized>(
        &self,
        n_rows: usize,
        rng: &mut R,
    ) -> Result<Partition, SplitError> {
        let n_test = self.test_size(n_rows)?;
        let mut indices: Vec<usize> = (0..n_rows).collect();
        indices.shuffle(rng);

        let mut test = indices[..n_test].to_vec();
        let mut train = indices[n_test..].to_vec();
        test.sort_unstable();
        train.sort_unstable();
        Ok(Partition { train, test })
    }
}

/// Draw `rows.len()` indices from `rows` with replacement.
pub fn bootstrap<R: Rng + ?Sized>(rows: &[usize], rng: &mut R) -> Vec<usize> {
    if rows.is_empty() {
        return Vec::new();
    }
    (0..rows.len())
        .map(|_| rows[rng.gen_range(0..rows.len())])
        .collect()
}
