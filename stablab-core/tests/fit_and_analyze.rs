//! Dataset → split → preprocessing → fit → structure, through public APIs.

use rand::rngs::StdRng;
use rand::SeedableRng;
use stablab_core::data::{bootstrap, DatasetProvider, Splitter, StandardDatasetProvider};
use stablab_core::models::{LinearParams, TreeParams};
use stablab_core::preprocessing::build_preprocessing_pipe;
use stablab_core::{AdapterRegistry, ModelKey, RngHierarchy, Structure};

fn registry() -> AdapterRegistry {
    AdapterRegistry::standard(TreeParams::default(), LinearParams::default())
}

#[test]
fn every_model_fits_every_variant() {
    let dataset = StandardDatasetProvider::new("unused")
        .with_synthetic_rows(60)
        .get_dataset("friedman1")
        .unwrap();
    let hierarchy = RngHierarchy::new(5);
    let partition = Splitter::default()
        .partition(dataset.n_rows(), &mut hierarchy.split_rng(&dataset.name, 0))
        .unwrap();
    let registry = registry();

    for key in registry.keys() {
        let adapter = registry.resolve(&key).unwrap();
        for variant in build_preprocessing_pipe() {
            let mut rng = hierarchy.iteration_rng(&dataset.name, 0, 0);
            let rows = bootstrap(&partition.train, &mut rng);
            let (x_train, y_train) = dataset.select(&rows);
            let (x_test, _) = dataset.select(&partition.test);
            let fitted = variant.fit(&x_train).unwrap();

            let (model, predictions) = adapter
                .fit_predict(&fitted.transform(&x_train), &y_train, &fitted.transform(&x_test), &mut rng)
                .unwrap();
            assert_eq!(predictions.len(), partition.test.len(), "{key} {}", variant.name());
            assert!(predictions.iter().all(|p| p.is_finite()));

            let structure = adapter.analyze(&model).unwrap();
            assert_eq!(structure.family(), key.family);
            assert!(!structure.summary().is_empty());
        }
    }
}

#[test]
fn lasso_drops_noise_features_on_sparse_data() {
    let dataset = StandardDatasetProvider::new("unused").get_dataset("linear").unwrap();
    let registry = registry();
    let key: ModelKey = "LM:lasso".parse().unwrap();
    let adapter = registry.resolve(&key).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let (model, _) = adapter
        .fit_predict(&dataset.features, &dataset.target, &dataset.features[..1], &mut rng)
        .unwrap();

    let Structure::Linear(structure) = adapter.analyze(&model).unwrap() else {
        panic!("expected a linear structure");
    };
    let summary = Structure::Linear(structure.clone()).summary();
    assert!(summary["n_nonzero"] < 8.0);
    // the two largest true weights survive the penalty
    assert!(structure.coefficients[0] > 1.0);
    assert!(structure.coefficients[1] < -0.5);
}

#[test]
fn different_iterations_give_different_trees() {
    let dataset = StandardDatasetProvider::new("unused").get_dataset("friedman1").unwrap();
    let hierarchy = RngHierarchy::new(42);
    let registry = registry();
    let key: ModelKey = "DT:sklearn".parse().unwrap();
    let adapter = registry.resolve(&key).unwrap();
    let partition = Splitter::default()
        .partition(dataset.n_rows(), &mut hierarchy.split_rng(&dataset.name, 0))
        .unwrap();

    let fit = |iteration: usize| {
        let mut rng = hierarchy.iteration_rng(&dataset.name, 0, iteration);
        let rows = bootstrap(&partition.train, &mut rng);
        let (x, y) = dataset.select(&rows);
        adapter.fit_predict(&x, &y, &x[..1], &mut rng).unwrap().0
    };
    let (a, b) = (fit(0), fit(1));
    assert!(adapter.compare(&a, &b).unwrap() > 0.0);
    assert_eq!(adapter.compare(&a, &fit(0)).unwrap(), 0.0);
}
