//! Serializable evaluation configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stablab_core::data::split::DEFAULT_TEST_FRACTION;
use stablab_core::data::provider::DEFAULT_SYNTHETIC_ROWS;
use stablab_core::models::{LinearParams, TreeParams};
use stablab_core::preprocessing::DEFAULT_VARIANTS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce one stability evaluation.
///
/// The model key is kept as text so that an unknown key surfaces as a
/// configuration error at run time rather than as a TOML parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub dataset_name: Option<String>,
    pub model_key: Option<String>,

    pub datasets_path: PathBuf,
    pub models_path: PathBuf,
    pub results_path: PathBuf,

    pub nbr_splits: usize,
    pub nbr_iter: usize,
    /// Prefix length taken from the preprocessing pipe.
    pub nbr_variants: usize,

    /// Reload a stored ensemble instead of training.
    pub load_existing_ensemble: bool,
    pub verbose: bool,

    pub seed: u64,
    pub test_fraction: f64,
    /// Resample the training partition with replacement per iteration.
    pub bootstrap: bool,
    /// Worker threads; `None` uses every available core.
    pub workers: Option<usize>,
    /// Rows generated for built-in datasets.
    pub synthetic_rows: usize,

    pub tree: TreeParams,
    pub linear: LinearParams,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            dataset_name: None,
            model_key: None,
            datasets_path: PathBuf::from("."),
            models_path: PathBuf::from("."),
            results_path: PathBuf::from("."),
            nbr_splits: 10,
            nbr_iter: 5,
            nbr_variants: DEFAULT_VARIANTS,
            load_existing_ensemble: false,
            verbose: false,
            seed: 42,
            test_fraction: DEFAULT_TEST_FRACTION,
            bootstrap: true,
            workers: None,
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
            tree: TreeParams::default(),
            linear: LinearParams::default(),
        }
    }
}

impl EvaluationConfig {
    /// Load a configuration from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Total number of models the grid trains.
    pub fn model_count(&self) -> usize {
        self.nbr_splits * self.nbr_iter * self.nbr_variants
    }

    /// Check counts, fractions and regularization strengths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nbr_splits == 0 {
            return Err(ConfigError::Invalid("nbr_splits must be at least 1".into()));
        }
        if self.nbr_iter == 0 {
            return Err(ConfigError::Invalid("nbr_iter must be at least 1".into()));
        }
        if self.nbr_variants == 0 {
            return Err(ConfigError::Invalid("nbr_variants must be at least 1".into()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.synthetic_rows == 0 {
            return Err(ConfigError::Invalid("synthetic_rows must be at least 1".into()));
        }
        for (name, value) in [
            ("linear.lasso_alpha", self.linear.lasso_alpha),
            ("linear.ridge_alpha", self.linear.ridge_alpha),
            ("linear.tol", self.linear.tol),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.linear.max_iter == 0 {
            return Err(ConfigError::Invalid("linear.max_iter must be at least 1".into()));
        }
        if self.tree.min_samples_split < 2 {
            return Err(ConfigError::Invalid("tree.min_samples_split must be at least 2".into()));
        }
        if self.tree.min_samples_leaf == 0 {
            return Err(ConfigError::Invalid("tree.min_samples_leaf must be at least 1".into()));
        }
        Ok(())
    }
}
