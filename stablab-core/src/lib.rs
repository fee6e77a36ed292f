//! StabLab Core: datasets, model fitting, adapter and aggregation registries.
//!
//! This crate holds everything a stability evaluation needs that does not
//! depend on running a grid:
//! - Domain types (model keys, datasets)
//! - Dataset providers and the train/test splitter
//! - Preprocessing variants
//! - Regression tree and linear model fitting plus structure extraction
//! - Model adapter registry and aggregation function registry
//! - Deterministic RNG hierarchy

pub mod aggregation;
pub mod data;
pub mod domain;
pub mod models;
pub mod preprocessing;
pub mod registry;
pub mod rng;

pub use aggregation::{AggregationError, AggregationRegistry};
pub use domain::{Dataset, ModelFamily, ModelKey, ModelVariant};
pub use models::{FittedModel, ModelError, Structure};
pub use registry::{AdapterRegistry, ModelAdapter, RegistryError};
pub use rng::RngHierarchy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Dataset>();
        require_sync::<Dataset>();
        require_send::<ModelKey>();
        require_sync::<ModelKey>();
        require_send::<FittedModel>();
        require_sync::<FittedModel>();
        require_send::<Structure>();
        require_sync::<Structure>();
        require_send::<AdapterRegistry>();
        require_sync::<AdapterRegistry>();
        require_send::<AggregationRegistry>();
        require_sync::<AggregationRegistry>();
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
        require_send::<data::StandardDatasetProvider>();
        require_sync::<data::StandardDatasetProvider>();
        require_send::<preprocessing::FittedPreprocessing>();
        require_sync::<preprocessing::FittedPreprocessing>();
    }

    #[test]
    fn send_sync_checks() {
        assert_send_sync();
    }
}
