//! Outlier model trait.
//!
//! RULE: Every detector in the ensemble implements OutlierModel.
//! A model sees one partition's feature matrix and nothing else;
//! it never reads another partition or another model's output.

use crate::{
    error::AuditResult,
    features::FeatureMatrix,
    rng::ModelRng,
    types::{ModelKind, OutlierLabel},
};

/// Per-row verdicts of one fitted model, aligned with the matrix rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelOutput {
    pub labels: Vec<OutlierLabel>,
    /// Native raw score. Sign and scale are model-specific.
    pub scores: Vec<f64>,
}

impl ModelOutput {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn outlier_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_outlier()).count()
    }
}

/// The contract every detector must fulfill.
pub trait OutlierModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Fit on `matrix` and label the same rows.
    ///
    /// - `rng`: this task's deterministic stream; models without
    ///   randomness ignore it.
    fn fit_predict(&self, matrix: &FeatureMatrix, rng: &mut ModelRng) -> AuditResult<ModelOutput>;
}

/// Labels from a contamination threshold: rows whose score falls strictly
/// below the `contamination` quantile of all scores are outliers.
pub(crate) fn label_below_offset(scores: &[f64], offset: f64) -> Vec<OutlierLabel> {
    scores
        .iter()
        .map(|&s| if s < offset { OutlierLabel::Outlier } else { OutlierLabel::Inlier })
        .collect()
}
