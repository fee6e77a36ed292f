//! Fitted-model state and the interpretable structures extracted from it.
//!
//! The engine only ever holds a [`FittedModel`] as an opaque, serializable
//! value; everything it needs (prediction, structure, distance) is reached
//! through a [`crate::registry::ModelAdapter`].

pub mod linear;
pub mod tree;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ModelFamily;

pub use linear::{LinearKind, LinearModel, LinearParams, LinearStructure};
pub use tree::{PathStep, RegressionTree, TreeNode, TreeParams, TreeStructure};

/// Errors raised while fitting, analysing or comparing models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("fit produced non-finite values: {0}")]
    NonFinite(String),
    #[error("least-squares system is singular")]
    Singular,
    #[error("model family mismatch: expected {expected:?}, found {found:?}")]
    FamilyMismatch {
        expected: ModelFamily,
        found: ModelFamily,
    },
}

/// Fitted-model state. Serializable so that ensembles can be stored and
/// reloaded without refitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FittedModel {
    Tree(RegressionTree),
    Linear(LinearModel),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Tree(_) => ModelFamily::DecisionTree,
            FittedModel::Linear(_) => ModelFamily::LinearModel,
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        match self {
            FittedModel::Tree(t) => x.iter().map(|row| t.predict_row(row)).collect(),
            FittedModel::Linear(m) => x.iter().map(|row| m.predict_row(row)).collect(),
        }
    }
}

/// Family-specific interpretable structure of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "structure", rename_all = "snake_case")]
pub enum Structure {
    Tree(TreeStructure),
    Linear(LinearStructure),
}

impl Structure {
    pub fn family(&self) -> ModelFamily {
        match self {
            Structure::Tree(_) => ModelFamily::DecisionTree,
            Structure::Linear(_) => ModelFamily::LinearModel,
        }
    }

    /// Per-instance scalar features; stability is their spread across an ensemble.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        match self {
            Structure::Tree(s) => s.summary(),
            Structure::Linear(s) => s.summary(),
        }
    }

    /// Non-negative, symmetric dissimilarity; zero for identical structures.
    pub fn distance(&self, other: &Structure) -> Result<f64, ModelError> {
        match (self, other) {
            (Structure::Tree(a), Structure::Tree(b)) => Ok(a.distance(b)),
            (Structure::Linear(a), Structure::Linear(b)) => Ok(a.distance(b)),
            _ => Err(ModelError::FamilyMismatch {
                expected: self.family(),
                found: other.family(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_across_families_is_an_error() {
        let linear = Structure::Linear(LinearStructure {
            coefficients: vec![1.0],
            intercept: 0.0,
        });
        let tree = Structure::Tree(TreeStructure {
            n_nodes: 1,
            n_leaves: 1,
            depth: 0,
            split_features: vec![],
            paths: vec![vec![]],
        });
        assert!(matches!(
            linear.distance(&tree),
            Err(ModelError::FamilyMismatch { .. })
        ));
    }

    #[test]
    fn fitted_model_serde_round_trip() {
        let model = FittedModel::Linear(LinearModel {
            kind: LinearKind::Ridge,
            coefficients: vec![0.1, -0.30000000000000004],
            intercept: 1.0 / 3.0,
        });
        let json = serde_json::to_string(&model).unwrap();
        let back: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
    }
}
