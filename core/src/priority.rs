//! The ranked output table and the summaries audit review reads from it.

use crate::{
    record::TransactionRecord,
    stats::percentile,
    types::{Jurisdiction, OutlierLabel, RowId},
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One scored transaction. Immutable once the table is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityRecord {
    pub row_id: RowId,
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub jurisdiction: Jurisdiction,
    pub local_density_label: OutlierLabel,
    pub isolation_label: OutlierLabel,
    /// Normalized to [-1, 1]; larger is more anomalous.
    pub local_density_score: f64,
    /// Normalized to [-1, 1]; larger is more anomalous.
    pub isolation_score: f64,
    pub technical_score: f64,
    /// Log amount scaled to [0, 1].
    pub financial_risk: f64,
    pub priority_score: f64,
}

/// Ranking order: priority descending, then row id ascending.
pub fn ranking_order(a: &PriorityRecord, b: &PriorityRecord) -> Ordering {
    b.priority_score
        .total_cmp(&a.priority_score)
        .then(a.row_id.cmp(&b.row_id))
}

/// Per-jurisdiction rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JurisdictionSummary {
    pub jurisdiction: Jurisdiction,
    pub transactions: usize,
    pub total_amount: f64,
    pub max_priority: f64,
}

/// Scored records ordered by [`ranking_order`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriorityTable {
    records: Vec<PriorityRecord>,
}

impl PriorityTable {
    /// Build a table, imposing the ranking order.
    pub fn new(mut records: Vec<PriorityRecord>) -> Self {
        records.sort_by(ranking_order);
        Self { records }
    }

    pub fn records(&self) -> &[PriorityRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PriorityRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, row_id: RowId) -> Option<&PriorityRecord> {
        self.records.iter().find(|r| r.row_id == row_id)
    }

    pub fn top(&self, n: usize) -> &[PriorityRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Priority score at quantile `q` (linear interpolation);
    /// 0.90 is the usual "top 10%" review cutoff.
    pub fn cutoff(&self, q: f64) -> Option<f64> {
        let scores: Vec<f64> = self.records.iter().map(|r| r.priority_score).collect();
        percentile(&scores, q)
    }

    /// Records scoring at or above the `q` cutoff, in rank order.
    pub fn above_cutoff(&self, q: f64) -> &[PriorityRecord] {
        let Some(cut) = self.cutoff(q) else {
            return &[];
        };
        let end = self.records.partition_point(|r| r.priority_score >= cut);
        &self.records[..end]
    }

    pub fn outlier_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.local_density_label.is_outlier() || r.isolation_label.is_outlier())
            .count()
    }

    pub fn by_jurisdiction(&self) -> Vec<JurisdictionSummary> {
        let mut groups: BTreeMap<Jurisdiction, JurisdictionSummary> = BTreeMap::new();
        for r in &self.records {
            let entry = groups.entry(r.jurisdiction).or_insert(JurisdictionSummary {
                jurisdiction: r.jurisdiction,
                transactions: 0,
                total_amount: 0.0,
                max_priority: f64::NEG_INFINITY,
            });
            entry.transactions += 1;
            entry.total_amount += r.record.amount;
            entry.max_priority = entry.max_priority.max(r.priority_score);
        }
        groups.into_values().collect()
    }
}
