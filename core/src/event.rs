//! The run audit trail.
//!
//! RULE: Every stage reports what it did through PipelineEvents, in
//! stage order. Events describe a run; they never feed back into it.

use crate::types::{ModelKind, Partition, RunId};
use serde::{Deserialize, Serialize};

/// Every event emitted during a pipeline run.
/// Variants may be added, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    // ── Run lifecycle ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
        input_rows: usize,
    },
    RunCompleted {
        run_id: RunId,
        ranked_rows: usize,
        flagged_rows: usize,
    },

    // ── Stage events ───────────────────────────────
    JurisdictionInferred {
        rows: usize,
        union_rows: usize,
        distinct_labels: usize,
    },
    FeaturesPrepared {
        confidential_rows: usize,
        ordinary_rows: usize,
    },
    ModelFitted {
        model: ModelKind,
        partition: Partition,
        rows: usize,
        outliers: usize,
    },
    PartitionSkipped {
        model: ModelKind,
        partition: Partition,
    },
    ScoresFused {
        rows: usize,
        cutoff_p90: Option<f64>,
    },
}

impl PipelineEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }       => "run_initialized",
            Self::RunCompleted { .. }         => "run_completed",
            Self::JurisdictionInferred { .. } => "jurisdiction_inferred",
            Self::FeaturesPrepared { .. }     => "features_prepared",
            Self::ModelFitted { .. }          => "model_fitted",
            Self::PartitionSkipped { .. }     => "partition_skipped",
            Self::ScoresFused { .. }          => "scores_fused",
        }
    }

    /// The pipeline stage that emitted this event.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. } | Self::RunCompleted { .. } => "pipeline",
            Self::JurisdictionInferred { .. } => "jurisdiction",
            Self::FeaturesPrepared { .. } => "features",
            Self::ModelFitted { .. } | Self::PartitionSkipped { .. } => "ensemble",
            Self::ScoresFused { .. } => "fusion",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    /// Position of the event within its run.
    pub seq: u64,
    pub stage: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized PipelineEvent
}

impl EventLogEntry {
    pub fn from_event(run_id: &str, seq: u64, event: &PipelineEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            run_id: run_id.to_string(),
            seq,
            stage: event.stage().to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }
}
