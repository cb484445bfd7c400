//! Score fusion and prioritization.
//!
//! STEPS (fixed, deterministic given the ensemble output):
//!   1. Concatenate each model's partition runs (confidential, then
//!      ordinary) and number the rows 0.. once, after concatenation.
//!   2. Inner-join the two model tables on that row id.
//!   3. Orient scores so larger = more anomalous: isolation 1 - score,
//!      local density |score|.
//!   4. Min-max each oriented score to [-1, 1] over the joined table.
//!   5. Technical score = mean of the two.
//!   6. Financial risk = log amount min-maxed to [0, 1].
//!   7. Priority = w_t * technical + w_f * financial.
//!   8. Sort by priority descending, row id ascending.

use crate::{
    config::PriorityWeights,
    ensemble::EnsembleOutput,
    error::{AuditError, AuditResult},
    features::{EngineeredRecord, FeatureColumn},
    priority::{PriorityRecord, PriorityTable},
    record::TransactionRecord,
    stats::min_max_scale,
    types::{Jurisdiction, ModelKind, OutlierLabel, Partition, RowId},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct ScoreRow {
    row_id: RowId,
    source_index: usize,
    label: OutlierLabel,
    score: f64,
}

fn concatenate(ensemble: &EnsembleOutput, model: ModelKind) -> AuditResult<Vec<ScoreRow>> {
    let mut table = Vec::new();
    for partition in Partition::ORDER {
        let run = ensemble.run(model, partition).ok_or_else(|| {
            AuditError::Other(anyhow::anyhow!("fusion: missing {model}/{partition} run"))
        })?;
        for (k, &source_index) in run.source_indices.iter().enumerate() {
            table.push(ScoreRow {
                row_id: 0,
                source_index,
                label: run.output.labels[k],
                score: run.output.scores[k],
            });
        }
    }
    for (id, row) in table.iter_mut().enumerate() {
        row.row_id = id as RowId;
    }
    Ok(table)
}

/// Fuse the ensemble's four runs into the ranked priority table.
///
/// `records`, `jurisdictions` and `engineered` are aligned by input index.
pub fn fuse_scores(
    records: &[TransactionRecord],
    jurisdictions: &[Jurisdiction],
    engineered: &[EngineeredRecord],
    ensemble: &EnsembleOutput,
    weights: PriorityWeights,
) -> AuditResult<PriorityTable> {
    if jurisdictions.len() != records.len() || engineered.len() != records.len() {
        return Err(AuditError::Other(anyhow::anyhow!(
            "fusion: {} records, {} labels, {} engineered rows",
            records.len(),
            jurisdictions.len(),
            engineered.len()
        )));
    }

    let local = concatenate(ensemble, ModelKind::LocalDensity)?;
    let isolation = concatenate(ensemble, ModelKind::Isolation)?;

    let by_id: HashMap<RowId, ScoreRow> = isolation.iter().map(|r| (r.row_id, *r)).collect();
    let joined: Vec<(ScoreRow, ScoreRow)> = local
        .iter()
        .filter_map(|l| by_id.get(&l.row_id).map(|i| (*l, *i)))
        .collect();

    let misaligned = joined.iter().any(|(l, i)| l.source_index != i.source_index);
    if misaligned || joined.len() != records.len() {
        return Err(AuditError::JoinMismatch {
            local_density: local.len(),
            isolation: isolation.len(),
        });
    }

    let local_oriented: Vec<f64> = joined.iter().map(|(l, _)| l.score.abs()).collect();
    let isolation_oriented: Vec<f64> = joined.iter().map(|(_, i)| 1.0 - i.score).collect();
    for (name, column) in [("local_density", &local_oriented), ("isolation", &isolation_oriented)] {
        if column.len() > 1 && column.iter().all(|v| *v == column[0]) {
            log::warn!("fusion: {name} scores are constant, normalized column collapses to -1");
        }
    }
    let local_scaled = min_max_scale(&local_oriented, -1.0, 1.0);
    let isolation_scaled = min_max_scale(&isolation_oriented, -1.0, 1.0);

    let log_amounts: Vec<f64> = joined
        .iter()
        .map(|(l, _)| engineered[l.source_index].get(FeatureColumn::LogAmount))
        .collect();
    let financial = min_max_scale(&log_amounts, 0.0, 1.0);

    let scored = joined
        .iter()
        .enumerate()
        .map(|(k, (l, i))| {
            let technical = (local_scaled[k] + isolation_scaled[k]) / 2.0;
            PriorityRecord {
                row_id: l.row_id,
                record: records[l.source_index].clone(),
                jurisdiction: jurisdictions[l.source_index],
                local_density_label: l.label,
                isolation_label: i.label,
                local_density_score: local_scaled[k],
                isolation_score: isolation_scaled[k],
                technical_score: technical,
                financial_risk: financial[k],
                priority_score: weights.technical * technical + weights.financial * financial[k],
            }
        })
        .collect();

    let table = PriorityTable::new(scored);
    log::info!(
        "fusion: {} rows ranked, {} flagged by at least one model",
        table.len(),
        table.outlier_count()
    );
    Ok(table)
}
