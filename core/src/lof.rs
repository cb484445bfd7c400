//! Local Outlier Factor.
//!
//! For each row: k nearest neighbours (self excluded, Euclidean), the
//! reachability distance to each neighbour, local reachability density
//! (lrd) as the inverse mean reachability, and LOF as the mean neighbour
//! lrd over the row's own lrd. The reported score is -LOF, so more
//! negative means more anomalous.
//!
//! Neighbour search is brute force, one row per rayon task.

use crate::{
    error::{AuditError, AuditResult},
    features::FeatureMatrix,
    model::{label_below_offset, ModelOutput, OutlierModel},
    rng::ModelRng,
    stats::{euclidean, percentile},
    types::{ModelKind, Partition},
};
use rayon::prelude::*;

const LRD_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    pub n_neighbors: usize,
    pub contamination: f64,
    /// Only used to make the degenerate-partition error descriptive.
    pub partition: Partition,
}

struct Neighbourhood {
    /// (index, distance), ascending by distance, length k.
    neighbours: Vec<(usize, f64)>,
}

impl Neighbourhood {
    fn k_distance(&self) -> f64 {
        self.neighbours.last().map_or(0.0, |(_, d)| *d)
    }
}

impl LocalOutlierFactor {
    pub fn new(n_neighbors: usize, contamination: f64, partition: Partition) -> Self {
        Self { n_neighbors, contamination, partition }
    }

    fn neighbourhoods(&self, matrix: &FeatureMatrix) -> Vec<Neighbourhood> {
        let k = self.n_neighbors;
        (0..matrix.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = matrix.row(i);
                let mut dists: Vec<(usize, f64)> = (0..matrix.n_rows())
                    .filter(|&j| j != i)
                    .map(|j| (j, euclidean(row, matrix.row(j))))
                    .collect();
                let by_distance = |a: &(usize, f64), b: &(usize, f64)| {
                    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
                };
                if dists.len() > k {
                    dists.select_nth_unstable_by(k - 1, by_distance);
                    dists.truncate(k);
                }
                dists.sort_by(by_distance);
                Neighbourhood { neighbours: dists }
            })
            .collect()
    }

    /// Negative outlier factor per row.
    pub fn score(&self, matrix: &FeatureMatrix) -> AuditResult<Vec<f64>> {
        self.check_partition(matrix.n_rows())?;

        let hoods = self.neighbourhoods(matrix);
        let k_dist: Vec<f64> = hoods.iter().map(Neighbourhood::k_distance).collect();

        let lrd: Vec<f64> = hoods
            .par_iter()
            .map(|h| {
                let reach_sum: f64 = h
                    .neighbours
                    .iter()
                    .map(|&(j, d)| d.max(k_dist[j]))
                    .sum();
                1.0 / (reach_sum / h.neighbours.len() as f64 + LRD_EPSILON)
            })
            .collect();

        let scores = hoods
            .par_iter()
            .enumerate()
            .map(|(i, h)| {
                let mean_ratio = h.neighbours.iter().map(|&(j, _)| lrd[j]).sum::<f64>()
                    / h.neighbours.len() as f64
                    / lrd[i];
                -mean_ratio
            })
            .collect();
        Ok(scores)
    }

    fn check_partition(&self, rows: usize) -> AuditResult<()> {
        if self.n_neighbors == 0 || rows <= self.n_neighbors {
            return Err(AuditError::DegeneratePartition {
                model: ModelKind::LocalDensity,
                partition: self.partition,
                rows,
                n_neighbors: self.n_neighbors,
            });
        }
        Ok(())
    }
}

impl OutlierModel for LocalOutlierFactor {
    fn kind(&self) -> ModelKind {
        ModelKind::LocalDensity
    }

    fn fit_predict(&self, matrix: &FeatureMatrix, _rng: &mut ModelRng) -> AuditResult<ModelOutput> {
        if matrix.is_empty() {
            return Ok(ModelOutput::default());
        }
        let scores = self.score(matrix)?;
        let offset = percentile(&scores, self.contamination).unwrap_or(f64::NEG_INFINITY);
        Ok(ModelOutput { labels: label_below_offset(&scores, offset), scores })
    }
}
