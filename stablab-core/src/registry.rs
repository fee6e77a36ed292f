//! Model adapter registry: maps a [`ModelKey`] to fit/analyze/compare.
//!
//! The registry is an explicit value built once at start-up and passed by
//! reference into the runner, analyzer and comparator. Each adapter carries all
//! three capabilities, so a key that resolves at all resolves for every stage.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use thiserror::Error;

use crate::domain::{ModelFamily, ModelKey, ModelVariant};
use crate::models::{
    FittedModel, LinearKind, LinearModel, LinearParams, ModelError, RegressionTree, Structure,
    TreeParams,
};

/// The three capabilities the engine needs from a model implementation.
pub trait ModelAdapter: Send + Sync {
    fn key(&self) -> ModelKey;

    /// Fit on the training rows and predict the held-out rows.
    ///
    /// `rng` is the iteration-specific randomness source; adapters that have
    /// no internal randomness ignore it.
    fn fit_predict(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        rng: &mut StdRng,
    ) -> Result<(FittedModel, Vec<f64>), ModelError>;

    /// Extract the interpretable structure. Deterministic.
    fn analyze(&self, model: &FittedModel) -> Result<Structure, ModelError>;

    /// Non-negative, symmetric structural dissimilarity; `compare(m, m) == 0`.
    fn compare(&self, a: &FittedModel, b: &FittedModel) -> Result<f64, ModelError> {
        let sa = self.analyze(a)?;
        let sb = self.analyze(b)?;
        self.compare_structures(&sa, &sb)
    }

    /// Distance between two structures already produced by [`Self::analyze`].
    ///
    /// Callers comparing many pairs analyze each model once and go through
    /// this instead of [`Self::compare`].
    fn compare_structures(&self, a: &Structure, b: &Structure) -> Result<f64, ModelError> {
        a.distance(b)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unsupported model {0}: not registered")]
    UnsupportedModel(ModelKey),
}

/// Registry of model adapters.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ModelKey, Arc<dyn ModelAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in adapters.
    pub fn standard(tree: TreeParams, linear: LinearParams) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TreeAdapter::new(tree)));
        registry.register(Arc::new(LinearAdapter::least_squares(linear)));
        registry.register(Arc::new(LinearAdapter::lasso(linear)));
        registry.register(Arc::new(LinearAdapter::ridge(linear)));
        registry
    }

    /// Register (or replace) the adapter for its key.
    pub fn register(&mut self, adapter: Arc<dyn ModelAdapter>) {
        self.adapters.insert(adapter.key(), adapter);
    }

    pub fn resolve(&self, key: &ModelKey) -> Result<&dyn ModelAdapter, RegistryError> {
        self.adapters
            .get(key)
            .map(|a| a.as_ref())
            .ok_or(RegistryError::UnsupportedModel(*key))
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.adapters.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<ModelKey> {
        self.adapters.keys().copied().collect()
    }
}

fn check_widths(x_train: &[Vec<f64>], x_test: &[Vec<f64>]) -> Result<(), ModelError> {
    let expected = x_train.first().map(Vec::len).unwrap_or(0);
    if let Some(row) = x_test.iter().find(|r| r.len() != expected) {
        return Err(ModelError::ShapeMismatch {
            expected,
            found: row.len(),
        });
    }
    Ok(())
}

/// `DT:sklearn`: CART regression tree.
#[derive(Debug, Clone)]
pub struct TreeAdapter {
    params: TreeParams,
}

impl TreeAdapter {
    pub fn new(params: TreeParams) -> Self {
        Self { params }
    }
}

impl ModelAdapter for TreeAdapter {
    fn key(&self) -> ModelKey {
        ModelKey::new(ModelFamily::DecisionTree, ModelVariant::Sklearn)
    }

    fn fit_predict(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        rng: &mut StdRng,
    ) -> Result<(FittedModel, Vec<f64>), ModelError> {
        check_widths(x_train, x_test)?;
        let tree = RegressionTree::fit(x_train, y_train, &self.params, rng)?;
        let model = FittedModel::Tree(tree);
        let predictions = model.predict(x_test);
        Ok((model, predictions))
    }

    fn analyze(&self, model: &FittedModel) -> Result<Structure, ModelError> {
        match model {
            FittedModel::Tree(tree) => Ok(Structure::Tree(tree.structure())),
            other => Err(ModelError::FamilyMismatch {
                expected: ModelFamily::DecisionTree,
                found: other.family(),
            }),
        }
    }
}

/// `LM:linear_regression`, `LM:lasso`, `LM:ridge`.
#[derive(Debug, Clone)]
pub struct LinearAdapter {
    variant: ModelVariant,
    kind: LinearKind,
    params: LinearParams,
}

impl LinearAdapter {
    pub fn least_squares(params: LinearParams) -> Self {
        Self {
            variant: ModelVariant::LinearRegression,
            kind: LinearKind::LeastSquares,
            params,
        }
    }

    pub fn lasso(params: LinearParams) -> Self {
        Self {
            variant: ModelVariant::Lasso,
            kind: LinearKind::Lasso,
            params,
        }
    }

    pub fn ridge(params: LinearParams) -> Self {
        Self {
            variant: ModelVariant::Ridge,
            kind: LinearKind::Ridge,
            params,
        }
    }
}

impl ModelAdapter for LinearAdapter {
    fn key(&self) -> ModelKey {
        ModelKey::new(ModelFamily::LinearModel, self.variant)
    }

    fn fit_predict(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        _rng: &mut StdRng,
    ) -> Result<(FittedModel, Vec<f64>), ModelError> {
        check_widths(x_train, x_test)?;
        let fitted = LinearModel::fit(self.kind, x_train, y_train, &self.params)?;
        let model = FittedModel::Linear(fitted);
        let predictions = model.predict(x_test);
        Ok((model, predictions))
    }

    fn analyze(&self, model: &FittedModel) -> Result<Structure, ModelError> {
        match model {
            FittedModel::Linear(m) => Ok(Structure::Linear(m.structure())),
            other => Err(ModelError::FamilyMismatch {
                expected: ModelFamily::LinearModel,
                found: other.family(),
            }),
        }
    }
}
