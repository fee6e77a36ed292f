//! Linear regressors: ordinary least squares, lasso and ridge.
//!
//! All three fit on column-centred data and recover the intercept from the
//! means, so the penalty never touches the intercept.
//!
//! - OLS solves the centred least-squares problem with SVD, retrying with
//!   looser tolerances for near-collinear designs.
//! - Ridge solves `(XᵀX + αI) w = Xᵀy` with Cholesky, falling back to SVD.
//! - Lasso minimises `(1/2n)‖y − Xw‖² + α‖w‖₁` by cyclic coordinate descent.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Regularisation and solver settings shared by the linear variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    pub lasso_alpha: f64,
    pub ridge_alpha: f64,
    /// Coordinate-descent sweeps for lasso.
    pub max_iter: usize,
    /// Lasso stops once no coefficient moves more than this in a sweep.
    pub tol: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            lasso_alpha: 1.0,
            ridge_alpha: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearKind {
    LeastSquares,
    Lasso,
    Ridge,
}

/// A fitted linear model `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub kind: LinearKind,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Interpretable structure of a fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearStructure {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Coefficients with magnitude at or below this count as zero.
const ZERO_COEF: f64 = 1e-12;

struct Centered {
    x: DMatrix<f64>,
    y: DVector<f64>,
    x_mean: Vec<f64>,
    y_mean: f64,
}

fn center(x: &[Vec<f64>], y: &[f64]) -> Result<Centered, ModelError> {
    if x.is_empty() || y.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::ShapeMismatch {
            expected: x.len(),
            found: y.len(),
        });
    }
    let n = x.len();
    let p = x[0].len();
    let mut x_mean = vec![0.0; p];
    for row in x {
        for (m, v) in x_mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut x_mean {
        *m /= n as f64;
    }
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let xc = DMatrix::from_fn(n, p, |i, j| x[i][j] - x_mean[j]);
    let yc = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));
    Ok(Centered {
        x: xc,
        y: yc,
        x_mean,
        y_mean,
    })
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

impl LinearModel {
    pub fn fit(
        kind: LinearKind,
        x: &[Vec<f64>],
        y: &[f64],
        params: &LinearParams,
    ) -> Result<Self, ModelError> {
        let c = center(x, y)?;
        let coefficients: Vec<f64> = if c.x.ncols() == 0 {
            Vec::new()
        } else {
            match kind {
                LinearKind::LeastSquares => fit_least_squares(&c)?,
                LinearKind::Ridge => fit_ridge(&c, params.ridge_alpha)?,
                LinearKind::Lasso => fit_lasso(&c, params),
            }
        };

        if coefficients.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite(format!("{kind:?} coefficients")));
        }
        let intercept = c.y_mean
            - coefficients
                .iter()
                .zip(&c.x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();
        if !intercept.is_finite() {
            return Err(ModelError::NonFinite(format!("{kind:?} intercept")));
        }

        Ok(Self {
            kind,
            coefficients,
            intercept,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    pub fn structure(&self) -> LinearStructure {
        LinearStructure {
            coefficients: self.coefficients.clone(),
            intercept: self.intercept,
        }
    }
}

fn fit_least_squares(c: &Centered) -> Result<Vec<f64>, ModelError> {
    solve_least_squares(&c.x, &c.y)
        .map(|beta| beta.iter().copied().collect())
        .ok_or(ModelError::Singular)
}

fn fit_ridge(c: &Centered, alpha: f64) -> Result<Vec<f64>, ModelError> {
    let p = c.x.ncols();
    let gram = c.x.transpose() * &c.x + DMatrix::<f64>::identity(p, p) * alpha;
    let rhs = c.x.transpose() * &c.y;
    let beta = match gram.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => solve_least_squares(&gram, &rhs).ok_or(ModelError::Singular)?,
    };
    Ok(beta.iter().copied().collect())
}

fn fit_lasso(c: &Centered, params: &LinearParams) -> Vec<f64> {
    let n = c.x.nrows();
    let p = c.x.ncols();
    let threshold = params.lasso_alpha * n as f64;
    let col_sq: Vec<f64> = (0..p).map(|j| c.x.column(j).norm_squared()).collect();

    let mut w = vec![0.0; p];
    let mut residual: Vec<f64> = c.y.iter().copied().collect();

    for sweep in 0..params.max_iter.max(1) {
        let mut max_delta: f64 = 0.0;
        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let col = c.x.column(j);
            let rho: f64 = col
                .iter()
                .zip(&residual)
                .map(|(xij, r)| xij * (r + xij * w[j]))
                .sum();
            let updated = soft_threshold(rho, threshold) / col_sq[j];
            let delta = updated - w[j];
            if delta != 0.0 {
                for (r, xij) in residual.iter_mut().zip(col.iter()) {
                    *r -= xij * delta;
                }
                w[j] = updated;
            }
            max_delta = max_delta.max(delta.abs());
        }
        if max_delta <= params.tol {
            tracing::trace!(sweeps = sweep + 1, "lasso converged");
            return w;
        }
    }
    tracing::debug!(max_iter = params.max_iter, "lasso reached max_iter before converging");
    w
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

impl LinearStructure {
    pub fn summary(&self) -> BTreeMap<String, f64> {
        let l1: f64 = self.coefficients.iter().map(|c| c.abs()).sum();
        let l2: f64 = self.coefficients.iter().map(|c| c * c).sum::<f64>().sqrt();
        let nonzero = self.coefficients.iter().filter(|c| c.abs() > ZERO_COEF).count();
        let max_abs = self.coefficients.iter().fold(0.0_f64, |m, c| m.max(c.abs()));

        let mut out = BTreeMap::from([
            ("intercept".to_string(), self.intercept),
            ("l1_norm".to_string(), l1),
            ("l2_norm".to_string(), l2),
            ("n_nonzero".to_string(), nonzero as f64),
            ("max_abs_coef".to_string(), max_abs),
        ]);
        for (j, c) in self.coefficients.iter().enumerate() {
            out.insert(format!("coef_{j}"), *c);
        }
        out
    }

    /// Euclidean distance between coefficient vectors (shorter one padded with
    /// zeros) plus the absolute intercept difference.
    pub fn distance(&self, other: &LinearStructure) -> f64 {
        let len = self.coefficients.len().max(other.coefficients.len());
        let sq: f64 = (0..len)
            .map(|j| {
                let a = self.coefficients.get(j).copied().unwrap_or(0.0);
                let b = other.coefficients.get(j).copied().unwrap_or(0.0);
                (a - b) * (a - b)
            })
            .sum();
        sq.sqrt() + (self.intercept - other.intercept).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2 + 3*x0 - 1*x1
        let x: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y = x.iter().map(|r| 2.0 + 3.0 * r[0] - r[1]).collect();
        (x, y)
    }

    #[test]
    fn least_squares_recovers_exact_line() {
        let (x, y) = line_data();
        let m = LinearModel::fit(LinearKind::LeastSquares, &x, &y, &LinearParams::default()).unwrap();
        assert!((m.coefficients[0] - 3.0).abs() < 1e-9);
        assert!((m.coefficients[1] + 1.0).abs() < 1e-9);
        assert!((m.intercept - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_shrinks_towards_zero() {
        let (x, y) = line_data();
        let ols = LinearModel::fit(LinearKind::LeastSquares, &x, &y, &LinearParams::default()).unwrap();
        let params = LinearParams {
            ridge_alpha: 100.0,
            ..LinearParams::default()
        };
        let ridge = LinearModel::fit(LinearKind::Ridge, &x, &y, &params).unwrap();
        let norm = |m: &LinearModel| m.structure().summary()["l2_norm"];
        assert!(norm(&ridge) < norm(&ols));
    }

    #[test]
    fn ridge_with_zero_alpha_matches_least_squares() {
        let (x, y) = line_data();
        let params = LinearParams {
            ridge_alpha: 0.0,
            ..LinearParams::default()
        };
        let ridge = LinearModel::fit(LinearKind::Ridge, &x, &y, &params).unwrap();
        assert!((ridge.coefficients[0] - 3.0).abs() < 1e-8);
        assert!((ridge.intercept - 2.0).abs() < 1e-8);
    }

    #[test]
    fn lasso_with_large_alpha_zeroes_everything() {
        let (x, y) = line_data();
        let params = LinearParams {
            lasso_alpha: 1e6,
            ..LinearParams::default()
        };
        let lasso = LinearModel::fit(LinearKind::Lasso, &x, &y, &params).unwrap();
        assert!(lasso.coefficients.iter().all(|c| *c == 0.0));
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert!((lasso.intercept - mean).abs() < 1e-12);
    }

    #[test]
    fn lasso_with_small_alpha_is_close_to_least_squares() {
        let (x, y) = line_data();
        let params = LinearParams {
            lasso_alpha: 1e-6,
            max_iter: 10_000,
            tol: 1e-10,
            ..LinearParams::default()
        };
        let lasso = LinearModel::fit(LinearKind::Lasso, &x, &y, &params).unwrap();
        assert!((lasso.coefficients[0] - 3.0).abs() < 1e-3);
        assert!((lasso.coefficients[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn empty_training_set_fails() {
        let err = LinearModel::fit(LinearKind::Ridge, &[], &[], &LinearParams::default()).unwrap_err();
        assert!(matches!(err, ModelError::EmptyTrainingSet));
    }

    #[test]
    fn summary_counts_nonzero_and_lists_coefficients() {
        let s = LinearStructure {
            coefficients: vec![0.0, -2.0, 1.0],
            intercept: 0.5,
        };
        let summary = s.summary();
        assert_eq!(summary["n_nonzero"], 2.0);
        assert_eq!(summary["l1_norm"], 3.0);
        assert_eq!(summary["max_abs_coef"], 2.0);
        assert_eq!(summary["coef_1"], -2.0);
    }

    #[test]
    fn distance_pads_shorter_vector() {
        let a = LinearStructure {
            coefficients: vec![3.0, 4.0],
            intercept: 1.0,
        };
        let b = LinearStructure {
            coefficients: vec![],
            intercept: 0.0,
        };
        assert_eq!(a.distance(&b), 6.0);
        assert_eq!(b.distance(&a), 6.0);
        assert_eq!(a.distance(&a), 0.0);
    }
}
