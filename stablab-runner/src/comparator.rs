//! All-pairs structural comparison of an ensemble.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stablab_core::{
    AdapterRegistry, AggregationError, AggregationRegistry, ModelError, RegistryError, Structure,
};
use thiserror::Error;
use tracing::debug;

use crate::ensemble::Ensemble;

#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("structure extraction failed for instance {index}: {source}")]
    Analyze {
        index: usize,
        #[source]
        source: ModelError,
    },
    #[error("comparing instances {left} and {right} failed: {source}")]
    Model {
        left: usize,
        right: usize,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Aggregated pairwise distances. An entry is `None` when the ensemble has
/// fewer than two instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub pair_count: usize,
    pub distances: BTreeMap<String, Option<f64>>,
}

/// Unordered index pairs `(i, j)` with `i < j`, row-major.
pub fn pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect()
}

/// Pairwise distances in [`pairs`] order.
///
/// Each instance is analyzed once; pairs are then compared on the extracted
/// structures. Runs on the current rayon pool.
pub fn pairwise_distances(
    ensemble: &Ensemble,
    registry: &AdapterRegistry,
) -> Result<Vec<f64>, ComparisonError> {
    let adapter = registry.resolve(&ensemble.model_key)?;
    let structures = ensemble
        .instances
        .par_iter()
        .enumerate()
        .map(|(index, instance)| {
            adapter
                .analyze(&instance.model)
                .map_err(|source| ComparisonError::Analyze { index, source })
        })
        .collect::<Result<Vec<Structure>, _>>()?;

    pairs(structures.len())
        .into_par_iter()
        .map(|(left, right)| {
            adapter
                .compare_structures(&structures[left], &structures[right])
                .map_err(|source| ComparisonError::Model {
                    left,
                    right,
                    source,
                })
        })
        .collect()
}

pub fn evaluate_stability_comparison(
    ensemble: &Ensemble,
    registry: &AdapterRegistry,
    aggregations: &AggregationRegistry,
) -> Result<ComparisonReport, ComparisonError> {
    let distances = pairwise_distances(ensemble, registry)?;
    debug!(pairs = distances.len(), "computed pairwise distances");

    let aggregated: BTreeMap<String, Option<f64>> = if distances.is_empty() {
        aggregations.names().into_iter().map(|name| (name, None)).collect()
    } else {
        aggregations
            .names()
            .into_iter()
            .map(|name| {
                let value = aggregations.apply(&name, &distances)?;
                Ok((name, Some(value)))
            })
            .collect::<Result<BTreeMap<_, _>, AggregationError>>()?
    };

    Ok(ComparisonReport {
        pair_count: distances.len(),
        distances: aggregated,
    })
}
