//! StabLab Runner: training grid, ensemble store, stability analysis.
//!
//! This crate builds on `stablab-core` to provide:
//! - TOML-backed evaluation configuration
//! - Parallel training grid over splits × iterations × preprocessing variants
//! - Ensemble persistence keyed by (model, dataset)
//! - Structural stability analysis and all-pairs comparison
//! - JSON and CSV results export
//! - The end-to-end evaluation pipeline

pub mod analyzer;
pub mod comparator;
pub mod config;
pub mod ensemble;
pub mod grid;
pub mod pipeline;
pub mod store;
pub mod writer;

pub use analyzer::{evaluate_stability, AnalysisError, StabilityReport};
pub use comparator::{evaluate_stability_comparison, ComparisonError, ComparisonReport};
pub use config::{ConfigError, EvaluationConfig};
pub use ensemble::{Ensemble, GridCell, GridShape, TrainedInstance, SCHEMA_VERSION};
pub use grid::{GridRunner, TrainingError};
pub use pipeline::{
    resolve_model_key, run_evaluation, run_evaluation_with, EvalError, EvaluationOutcome,
};
pub use store::StoreError;
pub use writer::{write_results, ResultPaths, StabilityResults, WriterError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn ensemble_types_are_send_sync() {
        assert_send::<Ensemble>();
        assert_sync::<Ensemble>();
        assert_send::<TrainedInstance>();
        assert_sync::<TrainedInstance>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<StabilityReport>();
        assert_sync::<StabilityReport>();
        assert_send::<ComparisonReport>();
        assert_sync::<ComparisonReport>();
        assert_send::<StabilityResults>();
        assert_sync::<StabilityResults>();
    }

    #[test]
    fn config_and_runner_are_send_sync() {
        assert_send::<EvaluationConfig>();
        assert_sync::<EvaluationConfig>();
        assert_send::<GridRunner<'static>>();
        assert_sync::<GridRunner<'static>>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<EvalError>();
        assert_sync::<EvalError>();
    }
}
