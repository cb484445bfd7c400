//! Isolation Forest.
//!
//! Each tree is grown on a random subsample (without replacement) of at
//! most `max_samples` rows, splitting on a random non-constant feature at a
//! uniform threshold between that feature's node minimum and maximum,
//! down to depth ceil(log2(sample size)). A row's anomaly score is
//! 2^(-E[h(x)] / c(sample size)), where h is its path length (plus the
//! expected remaining depth of the leaf it lands in). `score_samples`
//! returns the negated score; the decision function subtracts the
//! contamination quantile, so negative decisions are outliers.
//!
//! Trees are built in parallel. Each tree draws from its own stream
//! forked from the task RNG by tree index, so thread count never changes
//! the forest.

use crate::{
    error::AuditResult,
    features::FeatureMatrix,
    model::{label_below_offset, ModelOutput, OutlierModel},
    rng::ModelRng,
    stats::percentile,
    types::ModelKind,
};
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Score given to every row when the sample is too small to grow a tree.
const NEUTRAL_SCORE: f64 = -0.5;

/// Expected path length of an unsuccessful BST search among `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(matrix: &FeatureMatrix, sample: Vec<usize>, max_depth: usize, rng: &mut ModelRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(matrix, sample, 0, max_depth, rng);
        tree
    }

    /// Returns the index of the node it created.
    fn grow_node(
        &mut self,
        matrix: &FeatureMatrix,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut ModelRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        let mut features: Vec<usize> = (0..matrix.n_cols()).collect();
        rng.shuffle(&mut features);
        let split = features.into_iter().find_map(|f| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &r| {
                let v = matrix.get(r, f);
                (mn.min(v), mx.max(v))
            });
            (max > min).then_some((f, min, max))
        });
        let Some((feature, min, max)) = split else {
            return id;
        };

        let threshold = rng.uniform(min, max);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| matrix.get(r, feature) <= threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return id;
        }

        let left = self.grow_node(matrix, left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(matrix, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split { feature, threshold, left, right } => {
                    node = if row[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// A fitted forest, reusable for scoring.
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl FittedForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Negated anomaly score; lower means more anomalous. In [-1, 0].
    pub fn score_samples(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        if norm == 0.0 || self.trees.is_empty() {
            return vec![NEUTRAL_SCORE; matrix.n_rows()];
        }
        (0..matrix.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = matrix.row(i);
                let mean_depth = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }
}

impl IsolationForest {
    pub fn new(n_estimators: usize, max_samples: usize, contamination: f64) -> Self {
        Self { n_estimators, max_samples, contamination }
    }

    pub fn fit(&self, matrix: &FeatureMatrix, rng: &ModelRng) -> FittedForest {
        let sample_size = self.max_samples.min(matrix.n_rows());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut tree_rng = rng.fork(t as u64);
                let sample = tree_rng.sample_indices(matrix.n_rows(), sample_size);
                IsolationTree::grow(matrix, sample, max_depth, &mut tree_rng)
            })
            .collect();
        FittedForest { trees, sample_size }
    }
}

impl OutlierModel for IsolationForest {
    fn kind(&self) -> ModelKind {
        ModelKind::Isolation
    }

    /// Scores are the decision function: score_samples minus the
    /// contamination quantile.
    fn fit_predict(&self, matrix: &FeatureMatrix, rng: &mut ModelRng) -> AuditResult<ModelOutput> {
        if matrix.is_empty() {
            return Ok(ModelOutput::default());
        }
        let forest = self.fit(matrix, rng);
        let raw = forest.score_samples(matrix);
        let offset = percentile(&raw, self.contamination).unwrap_or(0.0);
        let scores: Vec<f64> = raw.iter().map(|s| s - offset).collect();
        Ok(ModelOutput { labels: label_below_offset(&scores, 0.0), scores })
    }
}
