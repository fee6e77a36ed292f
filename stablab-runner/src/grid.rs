//! Training grid runner.
//!
//! Trains one model per grid cell on a rayon pool. Each cell derives
//! its randomness from the RNG hierarchy rather than from a shared generator,
//! so the ensemble is identical for any worker count.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use stablab_core::data::{bootstrap, Partition, SplitError, Splitter};
use stablab_core::preprocessing::{Preprocessing, PreprocessingError};
use stablab_core::registry::ModelAdapter;
use stablab_core::{AdapterRegistry, Dataset, ModelError, ModelKey, RegistryError, RngHierarchy};
use thiserror::Error;
use tracing::{debug, info};

use crate::ensemble::{Ensemble, GridCell, GridShape, TrainedInstance};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("grid is empty: {0:?}")]
    EmptyGrid(GridShape),
    #[error("split failed for dataset '{dataset}': {source}")]
    Split {
        dataset: String,
        #[source]
        source: SplitError,
    },
    #[error("preprocessing '{variant}' failed at {cell:?}: {source}")]
    Preprocessing {
        variant: &'static str,
        cell: GridCell,
        #[source]
        source: PreprocessingError,
    },
    #[error("fitting {key} failed at {cell:?}: {source}")]
    Fit {
        key: ModelKey,
        cell: GridCell,
        #[source]
        source: ModelError,
    },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Grid runner.
#[derive(Debug, Clone)]
pub struct GridRunner<'a> {
    registry: &'a AdapterRegistry,
    splitter: Splitter,
    rng: RngHierarchy,
    bootstrap: bool,
    workers: Option<usize>,
}

impl<'a> GridRunner<'a> {
    pub fn new(registry: &'a AdapterRegistry, splitter: Splitter, seed: u64) -> Self {
        Self {
            registry,
            splitter,
            rng: RngHierarchy::new(seed),
            bootstrap: true,
            workers: None,
        }
    }

    /// Enables or disables bootstrap resampling of the training rows.
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Runs on a dedicated pool of `workers` threads. `None` runs on the
    /// current rayon pool, so a caller inside `ThreadPool::install` keeps its bound.
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn run(
        &self,
        key: ModelKey,
        dataset: &Dataset,
        splits: usize,
        iterations: usize,
        variants: &[Preprocessing],
    ) -> Result<Ensemble, TrainingError> {
        self.run_with_progress(key, dataset, splits, iterations, variants, |_, _| {})
    }

    /// Trains the grid, calling `progress(completed, total)` after each cell.
    ///
    /// Cells complete in arbitrary order; `completed` is monotone.
    pub fn run_with_progress<F>(
        &self,
        key: ModelKey,
        dataset: &Dataset,
        splits: usize,
        iterations: usize,
        variants: &[Preprocessing],
        progress: F,
    ) -> Result<Ensemble, TrainingError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let adapter = self.registry.resolve(&key)?;
        let shape = GridShape::new(splits, iterations, variants.len());
        if shape.size() == 0 {
            return Err(TrainingError::EmptyGrid(shape));
        }

        let partitions = (0..splits)
            .map(|split| {
                let mut rng = self.rng.split_rng(&dataset.name, split);
                self.splitter
                    .partition(dataset.n_rows(), &mut rng)
                    .map_err(|source| TrainingError::Split {
                        dataset: dataset.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cells = shape.cells();
        let total = cells.len();
        info!(model = %key, dataset = %dataset.name, total, "training grid");

        let completed = AtomicUsize::new(0);
        let train_all = || {
            cells
                .par_iter()
                .map(|&cell| {
                    let instance = self.train_cell(
                        adapter,
                        key,
                        dataset,
                        &partitions[cell.split_index],
                        variants[cell.variant_index],
                        cell,
                    )?;
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress(done, total);
                    Ok(instance)
                })
                .collect::<Result<Vec<_>, TrainingError>>()
        };

        let instances = match self.workers {
            Some(workers) => rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| TrainingError::ThreadPool(e.to_string()))?
                .install(train_all)?,
            None => train_all()?,
        };

        Ok(Ensemble::new(
            key,
            dataset.name.clone(),
            shape,
            self.rng.master_seed(),
            instances,
        ))
    }

    fn train_cell(
        &self,
        adapter: &dyn ModelAdapter,
        key: ModelKey,
        dataset: &Dataset,
        partition: &Partition,
        variant: Preprocessing,
        cell: GridCell,
    ) -> Result<TrainedInstance, TrainingError> {
        let mut rng = self
            .rng
            .iteration_rng(&dataset.name, cell.split_index, cell.iteration_index);

        let train_rows = if self.bootstrap {
            bootstrap(&partition.train, &mut rng)
        } else {
            partition.train.clone()
        };
        let (x_train_raw, y_train) = dataset.select(&train_rows);
        let (x_test_raw, test_targets) = dataset.select(&partition.test);

        let fitted = variant
            .fit(&x_train_raw)
            .map_err(|source| TrainingError::Preprocessing {
                variant: variant.name(),
                cell,
                source,
            })?;
        let x_train = fitted.transform(&x_train_raw);
        let x_test = fitted.transform(&x_test_raw);

        let (model, predictions) = adapter
            .fit_predict(&x_train, &y_train, &x_test, &mut rng)
            .map_err(|source| TrainingError::Fit { key, cell, source })?;

        debug!(
            split = cell.split_index,
            iteration = cell.iteration_index,
            variant = variant.name(),
            train = train_rows.len(),
            test = partition.test.len(),
            "trained cell"
        );

        Ok(TrainedInstance {
            cell,
            preprocessing: variant.name().to_string(),
            model,
            train_rows,
            test_rows: partition.test.clone(),
            predictions,
            test_targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stablab_core::models::{LinearParams, TreeParams};
    use stablab_core::preprocessing::select_variants;

    fn dataset(rows: usize) -> Dataset {
        let features: Vec<Vec<f64>> = (0..rows)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64, ((i * 3) % 5) as f64])
            .collect();
        let target = features.iter().map(|r| 2.0 * r[0] - r[1] + 0.5 * r[2]).collect();
        Dataset::new("toy", vec!["a".into(), "b".into(), "c".into()], features, target).unwrap()
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::standard(TreeParams::default(), LinearParams::default())
    }

    #[test]
    fn grid_size_is_product_of_dimensions() {
        let reg = registry();
        let runner = GridRunner::new(&reg, Splitter::default(), 7);
        let ensemble = runner
            .run("DT:sklearn".parse().unwrap(), &dataset(40), 2, 3, &select_variants(2).unwrap())
            .unwrap();
        assert_eq!(ensemble.len(), 12);
        assert_eq!(ensemble.shape, GridShape::new(2, 3, 2));
        let cells: Vec<GridCell> = ensemble.instances.iter().map(|i| i.cell).collect();
        assert_eq!(cells, ensemble.shape.cells());
    }

    #[test]
    fn variants_of_one_iteration_share_rows() {
        let reg = registry();
        let runner = GridRunner::new(&reg, Splitter::default(), 1);
        let ensemble = runner
            .run("LM:ridge".parse().unwrap(), &dataset(30), 1, 2, &select_variants(3).unwrap())
            .unwrap();
        let it0: Vec<_> = ensemble.instances.iter().filter(|i| i.cell.iteration_index == 0).collect();
        assert!(it0.windows(2).all(|w| w[0].train_rows == w[1].train_rows));
        assert_ne!(ensemble.instances[0].train_rows, ensemble.instances[3].train_rows);
    }

    #[test]
    fn without_bootstrap_train_rows_are_the_partition() {
        let reg = registry();
        let runner = GridRunner::new(&reg, Splitter::default(), 1).with_bootstrap(false);
        let ensemble = runner
            .run("LM:linear_regression".parse().unwrap(), &dataset(20), 1, 2, &select_variants(1).unwrap())
            .unwrap();
        let first = &ensemble.instances[0];
        assert_eq!(first.train_rows.len() + first.test_rows.len(), 20);
        assert_eq!(first.train_rows, ensemble.instances[1].train_rows);
    }

    #[test]
    fn unregistered_key_fails_before_training() {
        let reg = AdapterRegistry::new();
        let runner = GridRunner::new(&reg, Splitter::default(), 1);
        let err = runner
            .run("LM:ridge".parse().unwrap(), &dataset(20), 1, 1, &select_variants(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, TrainingError::Registry(_)));
    }

    #[test]
    fn progress_reaches_total() {
        let reg = registry();
        let runner = GridRunner::new(&reg, Splitter::default(), 3).with_workers(Some(2));
        let seen = AtomicUsize::new(0);
        runner
            .run_with_progress(
                "DT:sklearn".parse().unwrap(),
                &dataset(25),
                2,
                2,
                &select_variants(1).unwrap(),
                |done, total| {
                    assert_eq!(total, 4);
                    seen.fetch_max(done, Ordering::Relaxed);
                },
            )
            .unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn unbounded_runner_stays_on_the_callers_pool() {
        let reg = registry();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let widest = AtomicUsize::new(0);
        pool.install(|| {
            GridRunner::new(&reg, Splitter::default(), 3)
                .run_with_progress(
                    "LM:ridge".parse().unwrap(),
                    &dataset(25),
                    2,
                    2,
                    &select_variants(2).unwrap(),
                    |_, _| {
                        widest.fetch_max(rayon::current_num_threads(), Ordering::Relaxed);
                    },
                )
                .unwrap();
        });
        assert_eq!(widest.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn too_few_rows_is_a_split_error() {
        let reg = registry();
        let runner = GridRunner::new(&reg, Splitter::default(), 3);
        let err = runner
            .run("DT:sklearn".parse().unwrap(), &dataset(1), 1, 1, &select_variants(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, TrainingError::Split { .. }));
    }
}
