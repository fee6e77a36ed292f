//! Named reducers applied over collections of per-instance values.
//!
//! `mean`, `std` (population, ddof = 0) and `median` (mean of the two middle
//! values for even lengths). Every reducer rejects empty input; callers are
//! expected to guard zero-sized collections themselves.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("aggregation '{0}' called on an empty sequence")]
    EmptyInput(String),
    #[error("unknown aggregation function '{0}'")]
    UnknownFunction(String),
}

/// A reduction from a non-empty slice to one value.
pub type Reducer = fn(&[f64]) -> f64;

/// Registry of named aggregation functions. Names iterate in sorted order.
#[derive(Clone, Default)]
pub struct AggregationRegistry {
    functions: BTreeMap<String, Reducer>,
}

impl std::fmt::Debug for AggregationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl AggregationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `mean`, `std`, `median`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("mean", mean);
        registry.register("std", std_dev);
        registry.register("median", median);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, reducer: Reducer) {
        self.functions.insert(name.into(), reducer);
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Apply one named function.
    pub fn apply(&self, name: &str, values: &[f64]) -> Result<f64, AggregationError> {
        let reducer = self
            .functions
            .get(name)
            .ok_or_else(|| AggregationError::UnknownFunction(name.to_string()))?;
        if values.is_empty() {
            return Err(AggregationError::EmptyInput(name.to_string()));
        }
        Ok(reducer(values))
    }

    /// Apply every registered function, keyed by name.
    pub fn apply_all(&self, values: &[f64]) -> Result<BTreeMap<String, f64>, AggregationError> {
        self.functions
            .keys()
            .map(|name| Ok((name.clone(), self.apply(name, values)?)))
            .collect()
    }
}

/// Running mean and sum of squared deviations (Welford). A constant sequence
/// yields exactly that constant and exactly zero spread.
fn welford(values: &[f64]) -> (f64, f64) {
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (k, &v) in values.iter().enumerate() {
        let delta = v - mean;
        mean += delta / (k + 1) as f64;
        m2 += delta * (v - mean);
    }
    (mean, m2)
}

pub fn mean(values: &[f64]) -> f64 {
    welford(values).0
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    let (_, m2) = welford(values);
    (m2 / values.len() as f64).max(0.0).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
