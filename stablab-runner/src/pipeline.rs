//! End-to-end stability evaluation.
//!
//! Stages: load dataset, build the preprocessing pipe, train (or reload) the
//! ensemble, analyze, compare, write results. Each stage logs at `info`.
//! Nothing is written unless training finishes for every cell.

use std::path::PathBuf;

use stablab_core::data::{DataError, DatasetProvider, SplitError, Splitter, StandardDatasetProvider};
use stablab_core::domain::ModelKeyError;
use stablab_core::preprocessing::{select_variants, PreprocessingError};
use stablab_core::{AdapterRegistry, AggregationRegistry, ModelKey, RegistryError};
use thiserror::Error;
use tracing::info;

use crate::analyzer::{evaluate_stability, AnalysisError};
use crate::comparator::{evaluate_stability_comparison, ComparisonError};
use crate::config::{ConfigError, EvaluationConfig};
use crate::grid::{GridRunner, TrainingError};
use crate::store::{self, StoreError};
use crate::writer::{write_results, ResultPaths, StabilityResults, WriterError};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration error: missing {0}")]
    MissingSelection(&'static str),
    #[error("configuration error: {0}")]
    ModelKey(#[from] ModelKeyError),
    #[error("configuration error: {0}")]
    Registry(#[from] RegistryError),
    #[error("configuration error: {0}")]
    Dataset(#[from] DataError),
    #[error("configuration error: {0}")]
    Preprocessing(#[from] PreprocessingError),
    #[error("configuration error: {0}")]
    Split(#[from] SplitError),
    #[error("training failed: {0}")]
    Training(#[from] TrainingError),
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("persistence error: {0}")]
    Write(#[from] WriterError),
    #[error("stability analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("stability comparison failed: {0}")]
    Comparison(#[from] ComparisonError),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl EvalError {
    /// Raised before any training starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EvalError::Config(_)
                | EvalError::MissingSelection(_)
                | EvalError::ModelKey(_)
                | EvalError::Registry(_)
                | EvalError::Dataset(_)
                | EvalError::Preprocessing(_)
                | EvalError::Split(_)
        )
    }
}

/// What one evaluation produced.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub results: StabilityResults,
    pub result_paths: ResultPaths,
    /// Set when a fresh ensemble was trained and stored.
    pub ensemble_path: Option<PathBuf>,
}

/// Parse and resolve the configured model key.
pub fn resolve_model_key(
    config: &EvaluationConfig,
    registry: &AdapterRegistry,
) -> Result<ModelKey, EvalError> {
    let text = config
        .model_key
        .as_deref()
        .ok_or(EvalError::MissingSelection("model key"))?;
    let key: ModelKey = text.parse()?;
    registry.resolve(&key)?;
    Ok(key)
}

/// Run with the built-in dataset provider and standard registries.
pub fn run_evaluation(config: &EvaluationConfig) -> Result<EvaluationOutcome, EvalError> {
    let provider =
        StandardDatasetProvider::new(&config.datasets_path).with_synthetic_rows(config.synthetic_rows);
    let registry = AdapterRegistry::standard(config.tree, config.linear);
    let aggregations = AggregationRegistry::standard();
    run_evaluation_with(config, &provider, &registry, &aggregations)
}

pub fn run_evaluation_with(
    config: &EvaluationConfig,
    provider: &dyn DatasetProvider,
    registry: &AdapterRegistry,
    aggregations: &AggregationRegistry,
) -> Result<EvaluationOutcome, EvalError> {
    config.validate()?;
    let dataset_name = config
        .dataset_name
        .as_deref()
        .ok_or(EvalError::MissingSelection("dataset name"))?;
    let key = resolve_model_key(config, registry)?;
    let splitter = Splitter::new(config.test_fraction)?;

    info!(dataset = dataset_name, "loading dataset");
    let dataset = provider.get_dataset(dataset_name)?;

    info!(variants = config.nbr_variants, "building preprocessing pipe");
    let variants = select_variants(config.nbr_variants)?;

    // One pool per run: training, analysis and comparison all share its bound.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.unwrap_or(0))
        .build()?;

    let (ensemble, ensemble_path) = if config.load_existing_ensemble {
        info!(model = %key, path = %config.models_path.display(), "loading models");
        (store::load(&key, &dataset.name, &config.models_path)?, None)
    } else {
        info!(
            model = %key,
            count = config.model_count(),
            "training and testing models"
        );
        let runner = GridRunner::new(registry, splitter, config.seed).with_bootstrap(config.bootstrap);
        let ensemble = pool.install(|| {
            runner.run(key, &dataset, config.nbr_splits, config.nbr_iter, &variants)
        })?;

        info!("storing models");
        let path = store::store(&ensemble, &config.models_path)?;
        (ensemble, Some(path))
    };

    info!(instances = ensemble.len(), "evaluating models stability");
    let stability = pool.install(|| evaluate_stability(&ensemble, registry, aggregations))?;

    info!(pairs = ensemble.pair_count(), "evaluating and comparing models stability");
    let comparison =
        pool.install(|| evaluate_stability_comparison(&ensemble, registry, aggregations))?;

    info!("storing results");
    let results = StabilityResults::new(key, dataset.name.clone(), ensemble.len(), stability, comparison);
    let result_paths = write_results(&results, &config.results_path)?;

    info!("evaluation completed");
    Ok(EvaluationOutcome {
        results,
        result_paths,
        ensemble_path,
    })
}
