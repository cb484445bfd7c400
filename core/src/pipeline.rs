//! The audit pipeline: one batch run from cleaned records to the ranked
//! priority table.
//!
//! STAGE ORDER (fixed, documented, never reordered):
//!   1. Jurisdiction inference   (row-parallel)
//!   2. Feature engineering      (batch-wide)
//!   3. Anomaly ensemble         (feature preparation per partition,
//!                                4 model tasks in parallel)
//!   4. Score fusion             (join, normalize, weight, sort)
//!
//! RULES:
//!   - A stage starts only after the previous stage's output is complete.
//!   - Each stage's output is a new value; nothing is mutated in place.
//!   - All randomness flows through the RngBank seeded from the config.
//!   - Any stage failure aborts the run; there is no partial table.

use crate::{
    config::PipelineConfig,
    ensemble::{run_ensemble, split_partitions},
    error::{AuditError, AuditResult},
    event::{EventLogEntry, PipelineEvent},
    features::engineer_features,
    fusion::fuse_scores,
    jurisdiction::{infer_jurisdictions, JurisdictionRules},
    priority::PriorityTable,
    record::TransactionRecord,
    types::{Jurisdiction, RunId},
};
use std::collections::HashSet;

/// Fresh run identifier, `run-<uuid v4>`.
pub fn new_run_id() -> RunId {
    format!("run-{}", uuid::Uuid::new_v4())
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: RunId,
    pub table: PriorityTable,
    pub events: Vec<PipelineEvent>,
}

pub struct AuditPipeline {
    pub run_id: RunId,
    config: PipelineConfig,
    rules: JurisdictionRules,
    pool: rayon::ThreadPool,
}

impl AuditPipeline {
    /// Build a pipeline with the standard jurisdiction tables.
    pub fn new(run_id: RunId, config: PipelineConfig) -> AuditResult<Self> {
        Self::with_rules(run_id, config, JurisdictionRules::standard()?)
    }

    pub fn with_rules(run_id: RunId, config: PipelineConfig, rules: JurisdictionRules) -> AuditResult<Self> {
        config.validate()?;
        // num_threads(0) lets rayon use every available core.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism.unwrap_or(0))
            .thread_name(|i| format!("audit-worker-{i}"))
            .build()
            .map_err(|e| AuditError::ThreadPool(e.to_string()))?;
        Ok(Self { run_id, config, rules, pool })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every stage over `records` on this pipeline's thread pool.
    pub fn run(&self, records: &[TransactionRecord]) -> AuditResult<PipelineOutput> {
        self.pool.install(|| self.run_stages(records))
    }

    fn run_stages(&self, records: &[TransactionRecord]) -> AuditResult<PipelineOutput> {
        let mut events = vec![PipelineEvent::RunInitialized {
            run_id: self.run_id.clone(),
            seed: self.config.seed,
            input_rows: records.len(),
        }];

        // 1. Jurisdiction
        let jurisdictions = infer_jurisdictions(&self.rules, records);
        let union_rows = jurisdictions.iter().filter(|j| **j == Jurisdiction::Union).count();
        let distinct_labels = jurisdictions.iter().collect::<HashSet<_>>().len();
        log::info!(
            "pipeline: jurisdiction inferred for {} rows ({union_rows} union, {distinct_labels} labels)",
            jurisdictions.len()
        );
        events.push(PipelineEvent::JurisdictionInferred {
            rows: jurisdictions.len(),
            union_rows,
            distinct_labels,
        });

        // 2. Features
        let engineered = engineer_features(records, &jurisdictions)?;
        let partitions = split_partitions(records);
        log::info!(
            "pipeline: features engineered ({} confidential, {} ordinary)",
            partitions.confidential.len(),
            partitions.ordinary.len()
        );
        events.push(PipelineEvent::FeaturesPrepared {
            confidential_rows: partitions.confidential.len(),
            ordinary_rows: partitions.ordinary.len(),
        });

        // 3. Ensemble
        let ensemble = run_ensemble(records, &engineered, &self.config)?;
        for run in &ensemble.runs {
            events.push(if run.is_empty() {
                PipelineEvent::PartitionSkipped { model: run.model, partition: run.partition }
            } else {
                PipelineEvent::ModelFitted {
                    model: run.model,
                    partition: run.partition,
                    rows: run.source_indices.len(),
                    outliers: run.output.outlier_count(),
                }
            });
        }

        // 4. Fusion
        let table = fuse_scores(records, &jurisdictions, &engineered, &ensemble, self.config.weights)?;
        events.push(PipelineEvent::ScoresFused { rows: table.len(), cutoff_p90: table.cutoff(0.90) });
        events.push(PipelineEvent::RunCompleted {
            run_id: self.run_id.clone(),
            ranked_rows: table.len(),
            flagged_rows: table.outlier_count(),
        });

        log::info!("pipeline: run {} complete, {} rows ranked", self.run_id, table.len());
        Ok(PipelineOutput { run_id: self.run_id.clone(), table, events })
    }
}

impl PipelineOutput {
    /// Events as event-log rows, numbered in emission order.
    pub fn event_log(&self) -> AuditResult<Vec<EventLogEntry>> {
        self.events
            .iter()
            .enumerate()
            .map(|(seq, e)| {
                EventLogEntry::from_event(&self.run_id, seq as u64, e).map_err(AuditError::from)
            })
            .collect()
    }
}
