//! End-to-end evaluation scenarios through the public pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use stablab_core::data::StandardDatasetProvider;
use stablab_core::models::LinearParams;
use stablab_core::registry::{LinearAdapter, ModelAdapter};
use stablab_core::{AdapterRegistry, AggregationRegistry, FittedModel, ModelError, ModelKey, Structure};
use stablab_runner::store::{self, StoreError};
use stablab_runner::{run_evaluation, run_evaluation_with, EvalError, EvaluationConfig};

fn write_csv(dir: &Path, name: &str, rows: usize) {
    let mut text = String::from("x0,x1,x2,y\n");
    for i in 0..rows {
        let x0 = i as f64 / 10.0;
        let x1 = ((i * 7) % 13) as f64;
        let x2 = ((i * 5) % 3) as f64 - 1.0;
        let y = 1.5 * x0 - 0.3 * x1 + 2.0 * x2 + ((i % 4) as f64) * 0.1;
        text.push_str(&format!("{x0},{x1},{x2},{y}\n"));
    }
    std::fs::write(dir.join(format!("{name}.csv")), text).unwrap();
}

fn config(root: &Path, dataset: &str, model: &str) -> EvaluationConfig {
    EvaluationConfig {
        dataset_name: Some(dataset.to_string()),
        model_key: Some(model.to_string()),
        datasets_path: root.join("datasets"),
        models_path: root.join("models"),
        results_path: root.join("results"),
        ..EvaluationConfig::default()
    }
}

#[test]
fn hundred_rows_three_splits_two_iterations_two_variants() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("datasets")).unwrap();
    write_csv(&root.path().join("datasets"), "hundred", 100);

    let cfg = EvaluationConfig {
        nbr_splits: 3,
        nbr_iter: 2,
        nbr_variants: 2,
        ..config(root.path(), "hundred", "DT:sklearn")
    };
    let outcome = run_evaluation(&cfg).unwrap();

    assert_eq!(outcome.results.ensemble_size, 12);
    let aggregations: Vec<_> = outcome
        .results
        .stability
        .iter()
        .map(|r| r.aggregation.as_str())
        .collect();
    assert_eq!(aggregations, vec!["mean", "median", "std"]);
    assert_eq!(outcome.results.comparison.pair_count, 66);
    assert!(outcome
        .results
        .comparison
        .distances
        .values()
        .all(|d| d.map_or(false, |v| v >= 0.0)));

    assert!(outcome.ensemble_path.unwrap().is_file());
    assert!(outcome.result_paths.json.is_file());
    assert!(outcome.result_paths.csv.is_file());
}

#[test]
fn single_cell_grid_has_no_pairs() {
    let root = tempfile::tempdir().unwrap();
    let cfg = EvaluationConfig {
        nbr_splits: 1,
        nbr_iter: 1,
        nbr_variants: 1,
        ..config(root.path(), "sine", "LM:lasso")
    };
    let outcome = run_evaluation(&cfg).unwrap();

    assert_eq!(outcome.results.ensemble_size, 1);
    assert_eq!(outcome.results.comparison.pair_count, 0);
    assert_eq!(outcome.results.comparison.distances.len(), 3);
    assert!(outcome.results.comparison.distances.values().all(Option::is_none));
    // stds of a single instance are exactly zero
    let std = outcome
        .results
        .stability
        .iter()
        .find(|r| r.aggregation == "std")
        .unwrap();
    assert!(std.metrics.values().all(|v| *v == 0.0));
}

#[test]
fn unregistered_variant_fails_before_training() {
    let root = tempfile::tempdir().unwrap();
    let err = run_evaluation(&config(root.path(), "friedman1", "DT:xgboost")).unwrap_err();
    assert!(err.is_configuration(), "{err}");
    assert!(!root.path().join("models").exists());
}

#[test]
fn loading_without_stored_ensemble_fails() {
    let root = tempfile::tempdir().unwrap();
    let cfg = EvaluationConfig {
        load_existing_ensemble: true,
        ..config(root.path(), "linear", "LM:ridge")
    };
    let err = run_evaluation(&cfg).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Store(StoreError::EnsembleNotFound { .. })
    ));
    assert!(!root.path().join("results").exists());
}

#[test]
fn reload_reproduces_results() {
    let root = tempfile::tempdir().unwrap();
    let fresh_cfg = EvaluationConfig {
        nbr_splits: 2,
        nbr_iter: 2,
        nbr_variants: 2,
        ..config(root.path(), "linear", "LM:ridge")
    };
    let fresh = run_evaluation(&fresh_cfg).unwrap();

    let reload_cfg = EvaluationConfig {
        load_existing_ensemble: true,
        ..fresh_cfg.clone()
    };
    let reloaded = run_evaluation(&reload_cfg).unwrap();
    assert!(reloaded.ensemble_path.is_none());
    assert_eq!(reloaded.results.stability, fresh.results.stability);
    assert_eq!(reloaded.results.comparison, fresh.results.comparison);
}

#[test]
fn unknown_dataset_is_configuration() {
    let root = tempfile::tempdir().unwrap();
    let err = run_evaluation(&config(root.path(), "iris", "DT:sklearn")).unwrap_err();
    assert!(matches!(err, EvalError::Dataset(_)));
    assert!(err.is_configuration());
}

#[test]
fn stored_ensemble_is_keyed_by_model_and_dataset() {
    let root = tempfile::tempdir().unwrap();
    let cfg = EvaluationConfig {
        nbr_splits: 1,
        nbr_iter: 2,
        nbr_variants: 1,
        ..config(root.path(), "sine", "DT:sklearn")
    };
    run_evaluation(&cfg).unwrap();
    let key = "DT:sklearn".parse().unwrap();
    let ensemble = store::load(&key, "sine", &root.path().join("models")).unwrap();
    assert_eq!(ensemble.len(), 2);
    assert!(root.path().join("models").join("DT-sklearn_sine.json").is_file());
}

/// Ridge adapter that records the widest rayon pool it was called from.
struct PoolWidthAdapter {
    inner: LinearAdapter,
    widest: Arc<AtomicUsize>,
}

impl PoolWidthAdapter {
    fn record(&self) {
        self.widest
            .fetch_max(rayon::current_num_threads(), Ordering::Relaxed);
    }
}

impl ModelAdapter for PoolWidthAdapter {
    fn key(&self) -> ModelKey {
        self.inner.key()
    }

    fn fit_predict(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        rng: &mut StdRng,
    ) -> Result<(FittedModel, Vec<f64>), ModelError> {
        self.record();
        self.inner.fit_predict(x_train, y_train, x_test, rng)
    }

    fn analyze(&self, model: &FittedModel) -> Result<Structure, ModelError> {
        self.record();
        self.inner.analyze(model)
    }

    fn compare_structures(&self, a: &Structure, b: &Structure) -> Result<f64, ModelError> {
        self.record();
        self.inner.compare_structures(a, b)
    }
}

#[test]
fn configured_workers_bound_every_stage() {
    for workers in [1, 2] {
        let root = tempfile::tempdir().unwrap();
        let widest = Arc::new(AtomicUsize::new(0));
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(PoolWidthAdapter {
            inner: LinearAdapter::ridge(LinearParams::default()),
            widest: Arc::clone(&widest),
        }));
        let cfg = EvaluationConfig {
            nbr_splits: 2,
            nbr_iter: 2,
            nbr_variants: 2,
            workers: Some(workers),
            ..config(root.path(), "linear", "LM:ridge")
        };
        let provider = StandardDatasetProvider::new(&cfg.datasets_path);

        let outcome =
            run_evaluation_with(&cfg, &provider, &registry, &AggregationRegistry::standard())
                .unwrap();
        assert_eq!(outcome.results.comparison.pair_count, 28);
        assert_eq!(widest.load(Ordering::Relaxed), workers);
    }
}
