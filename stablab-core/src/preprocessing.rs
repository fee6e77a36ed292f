//! Feature preprocessing variants.
//!
//! Each variant is fitted on the training rows of one grid cell and then
//! applied to both partitions. The regression target is never transformed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregation::median;

/// Number of variants taken from the pipe when not configured.
pub const DEFAULT_VARIANTS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreprocessingError {
    #[error("requested {requested} preprocessing variants but only {available} exist")]
    TooManyVariants { requested: usize, available: usize },
    #[error("at least one preprocessing variant is required")]
    NoVariants,
    #[error("cannot fit preprocessing on zero rows")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocessing {
    Identity,
    Standardize,
    MinMax,
    /// Centre on the median, scale by the interquartile range.
    Robust,
    /// `sign(x) * ln(1 + |x|)`.
    SignedLog,
    StandardizeSignedLog,
}

impl Preprocessing {
    pub fn name(&self) -> &'static str {
        match self {
            Preprocessing::Identity => "identity",
            Preprocessing::Standardize => "standardize",
            Preprocessing::MinMax => "min_max",
            Preprocessing::Robust => "robust",
            Preprocessing::SignedLog => "signed_log",
            Preprocessing::StandardizeSignedLog => "standardize_signed_log",
        }
    }

    /// Fit column statistics on `rows`.
    pub fn fit(&self, rows: &[Vec<f64>]) -> Result<FittedPreprocessing, PreprocessingError> {
        let first = rows.first().ok_or(PreprocessingError::EmptyInput)?;
        let n_cols = first.len();
        let log_first = matches!(
            self,
            Preprocessing::SignedLog | Preprocessing::StandardizeSignedLog
        );

        let columns: Vec<Vec<f64>> = (0..n_cols)
            .map(|j| {
                rows.iter()
                    .map(|r| if log_first { signed_log(r[j]) } else { r[j] })
                    .collect()
            })
            .collect();

        let (shift, scale) = match self {
            Preprocessing::Identity | Preprocessing::SignedLog => {
                (vec![0.0; n_cols], vec![1.0; n_cols])
            }
            Preprocessing::Standardize | Preprocessing::StandardizeSignedLog => columns
                .iter()
                .map(|c| {
                    let mean = crate::aggregation::mean(c);
                    (mean, nonzero(crate::aggregation::std_dev(c)))
                })
                .unzip(),
            Preprocessing::MinMax => columns
                .iter()
                .map(|c| {
                    let lo = c.iter().copied().fold(f64::INFINITY, f64::min);
                    let hi = c.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (lo, nonzero(hi - lo))
                })
                .unzip(),
            Preprocessing::Robust => columns
                .iter()
                .map(|c| {
                    let (q1, q3) = quartiles(c);
                    (median(c), nonzero(q3 - q1))
                })
                .unzip(),
        };

        Ok(FittedPreprocessing {
            log_first,
            shift,
            scale,
        })
    }
}

fn nonzero(scale: f64) -> f64 {
    if scale.abs() > 1e-12 && scale.is_finite() {
        scale
    } else {
        1.0
    }
}

fn signed_log(x: f64) -> f64 {
    x.signum() * x.abs().ln_1p()
}

/// Linear-interpolated first and third quartiles.
fn quartiles(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let at = |q: f64| {
        let pos = q * (sorted.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    };
    (at(0.25), at(0.75))
}

/// Column statistics of one variant, ready to transform rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPreprocessing {
    log_first: bool,
    shift: Vec<f64>,
    scale: Vec<f64>,
}

impl FittedPreprocessing {
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, &v)| {
                        let v = if self.log_first { signed_log(v) } else { v };
                        let shift = self.shift.get(j).copied().unwrap_or(0.0);
                        let scale = self.scale.get(j).copied().unwrap_or(1.0);
                        (v - shift) / scale
                    })
                    .collect()
            })
            .collect()
    }
}

/// All available variants in pipe order.
pub fn build_preprocessing_pipe() -> Vec<Preprocessing> {
    vec![
        Preprocessing::Identity,
        Preprocessing::Standardize,
        Preprocessing::MinMax,
        Preprocessing::Robust,
        Preprocessing::SignedLog,
        Preprocessing::StandardizeSignedLog,
    ]
}

/// The first `count` variants of the pipe.
pub fn select_variants(count: usize) -> Result<Vec<Preprocessing>, PreprocessingError> {
    let pipe = build_preprocessing_pipe();
    if count == 0 {
        return Err(PreprocessingError::NoVariants);
    }
    if count > pipe.len() {
        return Err(PreprocessingError::TooManyVariants {
            requested: count,
            available: pipe.len(),
        });
    }
    Ok(pipe.into_iter().take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<f64>> {
        vec![vec![1.0, 10.0], vec![2.0, 10.0], vec![3.0, 10.0], vec![4.0, 10.0]]
    }

    #[test]
    fn pipe_order_is_stable() {
        let names: Vec<_> = build_preprocessing_pipe().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["identity", "standardize", "min_max", "robust", "signed_log", "standardize_signed_log"]
        );
    }

    #[test]
    fn select_prefix() {
        assert_eq!(select_variants(2).unwrap().len(), 2);
        assert_eq!(select_variants(0), Err(PreprocessingError::NoVariants));
        assert!(matches!(
            select_variants(7),
            Err(PreprocessingError::TooManyVariants { requested: 7, available: 6 })
        ));
    }

    #[test]
    fn standardize_uses_train_statistics() {
        let fitted = Preprocessing::Standardize.fit(&rows()).unwrap();
        let out = fitted.transform(&rows());
        let col0: Vec<f64> = out.iter().map(|r| r[0]).collect();
        assert!(crate::aggregation::mean(&col0).abs() < 1e-12);
        assert!((crate::aggregation::std_dev(&col0) - 1.0).abs() < 1e-12);
        // constant column is centred, not divided by zero
        assert!(out.iter().all(|r| r[1] == 0.0));

        let unseen = fitted.transform(&[vec![100.0, 10.0]]);
        assert!(unseen[0][0] > 10.0);
    }

    #[test]
    fn min_max_maps_train_range_to_unit_interval() {
        let out = Preprocessing::MinMax.fit(&rows()).unwrap().transform(&rows());
        assert_eq!(out[0][0], 0.0);
        assert_eq!(out[3][0], 1.0);
    }

    #[test]
    fn robust_centres_on_median() {
        let out = Preprocessing::Robust.fit(&rows()).unwrap().transform(&[vec![2.5, 10.0]]);
        assert_eq!(out[0][0], 0.0);
    }

    #[test]
    fn signed_log_is_odd() {
        let fitted = Preprocessing::SignedLog.fit(&rows()).unwrap();
        let out = fitted.transform(&[vec![-3.0, 3.0]]);
        assert_eq!(out[0][0], -out[0][1]);
    }

    #[test]
    fn identity_is_a_no_op() {
        let out = Preprocessing::Identity.fit(&rows()).unwrap().transform(&rows());
        assert_eq!(out, rows());
    }

    #[test]
    fn empty_fit_fails() {
        assert_eq!(
            Preprocessing::Standardize.fit(&[]),
            Err(PreprocessingError::EmptyInput)
        );
    }
}
