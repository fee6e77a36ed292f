//! Built-in synthetic regression datasets.
//!
//! Each generator is seeded from the dataset name, so `friedman1` with 200 rows
//! is the same table on every machine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::domain::{Dataset, DatasetError};

/// Names of the built-in datasets, sorted.
pub const BUILTIN_DATASETS: &[&str] = &["friedman1", "linear", "sine"];

fn rng_for(name: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(name.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

fn feature_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("x{i}")).collect()
}

/// Generate a built-in dataset, or `None` if `name` is not built in.
pub fn generate(name: &str, rows: usize) -> Option<Result<Dataset, DatasetError>> {
    let dataset = match name {
        "friedman1" => friedman1(rows),
        "linear" => sparse_linear(rows),
        "sine" => sine(rows),
        _ => return None,
    };
    Some(dataset)
}

/// Friedman #1: `10 sin(π x0 x1) + 20 (x2 − ½)² + 10 x3 + 5 x4 + ε`, ten
/// uniform features of which five are noise.
fn friedman1(rows: usize) -> Result<Dataset, DatasetError> {
    let mut rng = rng_for("friedman1");
    let mut features = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);
    for _ in 0..rows {
        let x: Vec<f64> = (0..10).map(|_| rng.gen_range(0.0..1.0)).collect();
        let noise: f64 = rng.sample(StandardNormal);
        let y = 10.0 * (std::f64::consts::PI * x[0] * x[1]).sin()
            + 20.0 * (x[2] - 0.5).powi(2)
            + 10.0 * x[3]
            + 5.0 * x[4]
            + noise;
        features.push(x);
        target.push(y);
    }
    Dataset::new("friedman1", feature_names(10), features, target)
}

/// Eight standard-normal features, three informative, noise sd 0.5.
fn sparse_linear(rows: usize) -> Result<Dataset, DatasetError> {
    const WEIGHTS: [f64; 8] = [3.0, -2.0, 0.0, 1.5, 0.0, 0.0, 0.0, 0.0];
    let mut rng = rng_for("linear");
    let mut features = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);
    for _ in 0..rows {
        let x: Vec<f64> = (0..WEIGHTS.len()).map(|_| rng.sample(StandardNormal)).collect();
        let noise: f64 = rng.sample(StandardNormal);
        let y = 1.0 + x.iter().zip(WEIGHTS).map(|(v, w)| v * w).sum::<f64>() + 0.5 * noise;
        features.push(x);
        target.push(y);
    }
    Dataset::new("linear", feature_names(WEIGHTS.len()), features, target)
}

/// One feature on `[0, 2π)`, `y = sin(x) + 0.1 ε`.
fn sine(rows: usize) -> Result<Dataset, DatasetError> {
    let mut rng = rng_for("sine");
    let mut features = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);
    for _ in 0..rows {
        let x = rng.gen_range(0.0..std::f64::consts::TAU);
        let noise: f64 = rng.sample(StandardNormal);
        features.push(vec![x]);
        target.push(x.sin() + 0.1 * noise);
    }
    Dataset::new("sine", feature_names(1), features, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_generate_requested_rows() {
        for name in BUILTIN_DATASETS {
            let ds = generate(name, 50).unwrap().unwrap();
            assert_eq!(ds.n_rows(), 50, "{name}");
            assert_eq!(ds.name, *name);
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate("friedman1", 20).unwrap().unwrap();
        let b = generate("friedman1", 20).unwrap().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_name_is_not_builtin() {
        assert!(generate("iris", 10).is_none());
    }

    #[test]
    fn zero_rows_is_an_error() {
        assert!(matches!(generate("sine", 0), Some(Err(DatasetError::Empty(_)))));
    }
}
