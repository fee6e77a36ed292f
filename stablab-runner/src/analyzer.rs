//! Per-instance structural summaries aggregated across an ensemble.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stablab_core::{AdapterRegistry, AggregationError, AggregationRegistry, ModelError, RegistryError};
use thiserror::Error;
use tracing::debug;

use crate::ensemble::{Ensemble, TrainedInstance};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("structure extraction failed for instance {index}: {source}")]
    Model {
        index: usize,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Metric name → aggregated value for one aggregation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub aggregation: String,
    pub metrics: BTreeMap<String, f64>,
}

/// Scalar summary of one instance: structure features plus held-out metrics.
pub fn instance_metrics(
    registry: &AdapterRegistry,
    ensemble: &Ensemble,
    index: usize,
    instance: &TrainedInstance,
) -> Result<BTreeMap<String, f64>, AnalysisError> {
    let adapter = registry.resolve(&ensemble.model_key)?;
    let structure = adapter
        .analyze(&instance.model)
        .map_err(|source| AnalysisError::Model { index, source })?;
    let mut metrics = structure.summary();
    if let Some(mse) = instance.test_mse() {
        metrics.insert("test_mse".to_string(), mse);
    }
    if let Some(r2) = instance.test_r2() {
        metrics.insert("test_r2".to_string(), r2);
    }
    Ok(metrics)
}

/// One report per aggregation function, in the registry's name order.
///
/// A metric missing from some instances is aggregated over the instances
/// that carry it.
pub fn evaluate_stability(
    ensemble: &Ensemble,
    registry: &AdapterRegistry,
    aggregations: &AggregationRegistry,
) -> Result<Vec<StabilityReport>, AnalysisError> {
    registry.resolve(&ensemble.model_key)?;

    let per_instance = ensemble
        .instances
        .par_iter()
        .enumerate()
        .map(|(index, instance)| instance_metrics(registry, ensemble, index, instance))
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for metrics in per_instance {
        for (name, value) in metrics {
            columns.entry(name).or_default().push(value);
        }
    }
    debug!(metrics = columns.len(), instances = ensemble.len(), "collected structure summaries");

    if columns.is_empty() {
        let name = aggregations.names().into_iter().next().unwrap_or_default();
        return Err(AggregationError::EmptyInput(name).into());
    }

    aggregations
        .names()
        .into_iter()
        .map(|aggregation| {
            let metrics = columns
                .iter()
                .map(|(metric, values)| Ok((metric.clone(), aggregations.apply(&aggregation, values)?)))
                .collect::<Result<BTreeMap<_, _>, AggregationError>>()?;
            Ok(StabilityReport {
                aggregation,
                metrics,
            })
        })
        .collect()
}
