//! Dual-population anomaly ensemble.
//!
//! Records are split by confidentiality first; every {model, partition}
//! pair is then an independent task (4 in total) fanned out over the
//! current rayon pool. Tasks share nothing mutable: each gets its own
//! prepared matrix copy, its own jitter and its own RNG slot.
//!
//! An empty partition yields an empty run, not an error. Any failing task
//! fails the whole ensemble.

use crate::{
    config::PipelineConfig,
    error::{AuditError, AuditResult},
    features::{prepare_features, EngineeredRecord, FeatureMatrix},
    iforest::IsolationForest,
    lof::LocalOutlierFactor,
    model::{ModelOutput, OutlierModel},
    record::TransactionRecord,
    rng::{ModelSlot, RngBank},
    types::{ModelKind, Partition},
};
use rayon::prelude::*;

/// Input-row indices of each population, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitions {
    pub confidential: Vec<usize>,
    pub ordinary: Vec<usize>,
}

impl Partitions {
    pub fn get(&self, partition: Partition) -> &[usize] {
        match partition {
            Partition::Confidential => &self.confidential,
            Partition::Ordinary => &self.ordinary,
        }
    }
}

pub fn split_partitions(records: &[TransactionRecord]) -> Partitions {
    let mut parts = Partitions::default();
    for (i, r) in records.iter().enumerate() {
        match Partition::of(r.is_confidential()) {
            Partition::Confidential => parts.confidential.push(i),
            Partition::Ordinary => parts.ordinary.push(i),
        }
    }
    parts
}

/// Result of one {model, partition} task.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub model: ModelKind,
    pub partition: Partition,
    /// Input-row index of each scored row, aligned with `output`.
    pub source_indices: Vec<usize>,
    pub output: ModelOutput,
}

impl ModelRun {
    pub fn is_empty(&self) -> bool {
        self.source_indices.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EnsembleOutput {
    pub runs: Vec<ModelRun>,
}

impl EnsembleOutput {
    pub fn run(&self, model: ModelKind, partition: Partition) -> Option<&ModelRun> {
        self.runs.iter().find(|r| r.model == model && r.partition == partition)
    }
}

fn build_model(kind: ModelKind, partition: Partition, config: &PipelineConfig) -> Box<dyn OutlierModel> {
    match kind {
        ModelKind::LocalDensity => Box::new(LocalOutlierFactor::new(
            config.local_density.n_neighbors,
            config.local_density.contamination,
            partition,
        )),
        ModelKind::Isolation => Box::new(IsolationForest::new(
            config.isolation.n_estimators,
            config.isolation.max_samples,
            config.isolation.contamination,
        )),
    }
}

/// Fit both models on both partitions.
///
/// `engineered` must be aligned with `records`.
pub fn run_ensemble(
    records: &[TransactionRecord],
    engineered: &[EngineeredRecord],
    config: &PipelineConfig,
) -> AuditResult<EnsembleOutput> {
    if records.len() != engineered.len() {
        return Err(AuditError::Other(anyhow::anyhow!(
            "ensemble: {} records but {} engineered rows",
            records.len(),
            engineered.len()
        )));
    }

    let partitions = split_partitions(records);
    let matrices: Vec<(Partition, FeatureMatrix)> = Partition::ORDER
        .par_iter()
        .map(|&p| {
            let rows: Vec<&EngineeredRecord> =
                partitions.get(p).iter().map(|&i| &engineered[i]).collect();
            (p, prepare_features(&rows))
        })
        .collect();

    let tasks: Vec<(ModelKind, Partition)> = ModelKind::ALL
        .iter()
        .flat_map(|&m| Partition::ORDER.iter().map(move |&p| (m, p)))
        .collect();

    let bank = RngBank::new(config.seed);
    let runs = tasks
        .par_iter()
        .map(|&(kind, partition)| {
            let matrix = matrices
                .iter()
                .find(|(p, _)| *p == partition)
                .map(|(_, m)| m)
                .ok_or_else(|| AuditError::Other(anyhow::anyhow!("no matrix for {partition}")))?;
            let source_indices = partitions.get(partition).to_vec();

            if matrix.is_empty() {
                log::warn!("ensemble: {kind}/{partition} partition is empty, skipping fit");
                return Ok(ModelRun { model: kind, partition, source_indices, output: ModelOutput::default() });
            }

            let mut rng = bank.for_slot(ModelSlot::of(kind, partition));
            let jittered = matrix.with_jitter(&mut rng, config.jitter_std);
            let output = build_model(kind, partition, config).fit_predict(&jittered, &mut rng)?;
            if output.len() != source_indices.len() {
                return Err(AuditError::Other(anyhow::anyhow!(
                    "{kind}/{partition}: {} scores for {} rows",
                    output.len(),
                    source_indices.len()
                )));
            }
            log::debug!(
                "ensemble: {kind}/{partition} fitted on {} rows, {} outliers",
                source_indices.len(),
                output.outlier_count()
            );
            Ok(ModelRun { model: kind, partition, source_indices, output })
        })
        .collect::<AuditResult<Vec<_>>>()?;

    Ok(EnsembleOutput { runs })
}
