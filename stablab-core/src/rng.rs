//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each split and each
//! `(split, iteration)` pair. Sub-seeds are derived via BLAKE3 hashing,
//! independently of thread scheduling order, so a training grid produces
//! identical ensembles regardless of worker count.

use rand::rngs::StdRng;
use rand::SeedableRng;

const SPLIT_DOMAIN: &[u8] = b"stablab/split";
const ITERATION_DOMAIN: &[u8] = b"stablab/iteration";

/// Deterministic RNG hierarchy.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed that drives the train/test partition of `split_index`.
    pub fn split_seed(&self, dataset: &str, split_index: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPLIT_DOMAIN);
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(dataset.as_bytes());
        hasher.update(&(split_index as u64).to_le_bytes());
        first_u64(hasher.finalize())
    }

    /// Sub-seed for one `(split, iteration)` pair.
    ///
    /// The preprocessing variant is deliberately not part of the key: every
    /// variant of the same `(split, iteration)` sees the same resample, so
    /// differences between variants come from preprocessing alone.
    pub fn iteration_seed(&self, dataset: &str, split_index: usize, iteration_index: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ITERATION_DOMAIN);
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(dataset.as_bytes());
        hasher.update(&(split_index as u64).to_le_bytes());
        hasher.update(&(iteration_index as u64).to_le_bytes());
        first_u64(hasher.finalize())
    }

    pub fn split_rng(&self, dataset: &str, split_index: usize) -> StdRng {
        StdRng::seed_from_u64(self.split_seed(dataset, split_index))
    }

    pub fn iteration_rng(&self, dataset: &str, split_index: usize, iteration_index: usize) -> StdRng {
        StdRng::seed_from_u64(self.iteration_seed(dataset, split_index, iteration_index))
    }
}

fn first_u64(hash: blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
