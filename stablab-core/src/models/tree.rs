//! CART regression tree with squared-error splits.
//!
//! Candidate features are visited in an order drawn from the caller's RNG and
//! the first strictly-best split wins, so two fits on identical data but
//! different RNG streams can pick different features when gains tie. This is
//! the same source of variation a seeded tree learner exposes.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Relative tolerance for purity and split gain. Both are scaled by the
/// magnitude of the node's targets so rounding noise never counts as signal.
const REL_EPS: f64 = 1e-12;

/// Growth limits for a regression tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
        samples: usize,
    },
}

/// A fitted regression tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub n_features: usize,
    pub nodes: Vec<TreeNode>,
}

/// One step of a root-to-leaf decision path, threshold omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub feature: usize,
    pub goes_left: bool,
}

/// Interpretable structure of a fitted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeStructure {
    pub n_nodes: usize,
    pub n_leaves: usize,
    pub depth: usize,
    /// Split feature of every internal node, in node order.
    pub split_features: Vec<usize>,
    /// Every decision path, in left-to-right leaf order.
    pub paths: Vec<Vec<PathStep>>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        if x.is_empty() || y.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: x.len(),
                found: y.len(),
            });
        }
        let n_features = x[0].len();
        let mut tree = Self {
            n_features,
            nodes: Vec::new(),
        };
        let indices: Vec<usize> = (0..y.len()).collect();
        tree.grow(x, y, indices, 0, params, rng);
        Ok(tree)
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        let n = indices.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64;
        let impurity = indices
            .iter()
            .map(|&i| (y[i] - mean) * (y[i] - mean))
            .sum::<f64>()
            / n as f64;
        self.nodes.push(TreeNode::Leaf {
            value: mean,
            samples: n,
        });

        let depth_exhausted = params.max_depth.is_some_and(|max| depth >= max);
        if depth_exhausted
            || n < params.min_samples_split.max(2)
            || n < 2 * params.min_samples_leaf.max(1)
            || impurity <= REL_EPS * (mean * mean).max(1.0)
        {
            return id;
        }

        let Some(split) = self.best_split(x, y, &indices, params, rng) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[i][split.feature] <= split.threshold);

        let left = self.grow(x, y, left_idx, depth + 1, params, rng);
        let right = self.grow(x, y, right_idx, depth + 1, params, rng);
        self.nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Maximise `S_l²/n_l + S_r²/n_r`, which minimises the summed squared error.
    fn best_split(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = params.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| y[i]).sum();
        let parent_score = total * total / n as f64;
        let sum_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let min_gain = REL_EPS * sum_sq.max(1.0);

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += y[order[pos - 1]];
                let lo = x[order[pos - 1]][feature];
                let hi = x[order[pos]][feature];
                if pos < min_leaf || n - pos < min_leaf || lo >= hi {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / pos as f64
                    + right_sum * right_sum / (n - pos) as f64;
                if score - parent_score <= min_gain {
                    continue;
                }
                if best.as_ref().map_or(true, |b| score > b.score) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // Midpoint can round up to `hi` for adjacent floats.
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }
        best
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn structure(&self) -> TreeStructure {
        let mut paths = Vec::new();
        let mut split_features = Vec::new();
        for node in &self.nodes {
            if let TreeNode::Split { feature, .. } = node {
                split_features.push(*feature);
            }
        }
        self.collect_paths(0, &mut Vec::new(), &mut paths);
        let depth = paths.iter().map(Vec::len).max().unwrap_or(0);
        TreeStructure {
            n_nodes: self.nodes.len(),
            n_leaves: paths.len(),
            depth,
            split_features,
            paths,
        }
    }

    fn collect_paths(&self, id: usize, prefix: &mut Vec<PathStep>, out: &mut Vec<Vec<PathStep>>) {
        match &self.nodes[id] {
            TreeNode::Leaf { .. } => out.push(prefix.clone()),
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => {
                prefix.push(PathStep {
                    feature: *feature,
                    goes_left: true,
                });
                self.collect_paths(*left, prefix, out);
                prefix.pop();
                prefix.push(PathStep {
                    feature: *feature,
                    goes_left: false,
                });
                self.collect_paths(*right, prefix, out);
                prefix.pop();
            }
        }
    }
}

impl TreeStructure {
    pub fn summary(&self) -> BTreeMap<String, f64> {
        let used: BTreeSet<usize> = self.split_features.iter().copied().collect();
        let mean_path = if self.paths.is_empty() {
            0.0
        } else {
            self.paths.iter().map(Vec::len).sum::<usize>() as f64 / self.paths.len() as f64
        };
        BTreeMap::from([
            ("depth".to_string(), self.depth as f64),
            ("n_leaves".to_string(), self.n_leaves as f64),
            ("n_nodes".to_string(), self.n_nodes as f64),
            ("n_features_used".to_string(), used.len() as f64),
            ("mean_path_length".to_string(), mean_path),
        ])
    }

    /// Mean of the split-feature total-variation distance and the decision-path
    /// Jaccard distance. Always in `[0, 1]`.
    pub fn distance(&self, other: &TreeStructure) -> f64 {
        0.5 * (self.feature_usage_distance(other) + self.path_distance(other))
    }

    fn feature_usage_distance(&self, other: &TreeStructure) -> f64 {
        match (self.split_features.is_empty(), other.split_features.is_empty()) {
            (true, true) => return 0.0,
            (true, false) | (false, true) => return 1.0,
            (false, false) => {}
        }
        let a = frequencies(&self.split_features);
        let b = frequencies(&other.split_features);
        let keys: BTreeSet<usize> = a.keys().chain(b.keys()).copied().collect();
        let l1: f64 = keys
            .iter()
            .map(|k| (a.get(k).copied().unwrap_or(0.0) - b.get(k).copied().unwrap_or(0.0)).abs())
            .sum();
        (0.5 * l1).min(1.0)
    }

    fn path_distance(&self, other: &TreeStructure) -> f64 {
        let a: BTreeSet<&Vec<PathStep>> = self.paths.iter().collect();
        let b: BTreeSet<&Vec<PathStep>> = other.paths.iter().collect();
        let union = a.union(&b).count();
        if union == 0 {
            return 0.0;
        }
        let shared = a.intersection(&b).count();
        1.0 - shared as f64 / union as f64
    }
}

fn frequencies(features: &[usize]) -> BTreeMap<usize, f64> {
    let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
    for &f in features {
        *counts.entry(f).or_insert(0.0) += 1.0;
    }
    let total = features.len() as f64;
    for v in counts.values_mut() {
        *v /= total;
    }
    counts
}
