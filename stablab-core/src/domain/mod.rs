//! Domain types for StabLab

pub mod dataset;
pub mod model_key;

pub use dataset::{Dataset, DatasetError};
pub use model_key::{ModelFamily, ModelKey, ModelKeyError, ModelVariant};

/// Row-major feature matrix.
pub type Features = Vec<Vec<f64>>;
