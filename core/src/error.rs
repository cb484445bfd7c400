use crate::types::{ModelKind, Partition};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema error: missing required field(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid value for '{field}' at row {row}: {reason}")]
    InvalidValue { field: String, row: usize, reason: String },

    #[error("Invalid configuration '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error(
        "Degenerate partition: {model} on {partition} has {rows} rows, \
         needs more than n_neighbors={n_neighbors}"
    )]
    DegeneratePartition {
        model: ModelKind,
        partition: Partition,
        rows: usize,
        n_neighbors: usize,
    },

    #[error("Score join mismatch: local_density has {local_density} rows, isolation has {isolation}")]
    JoinMismatch { local_density: usize, isolation: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuditError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Schema { missing: vec![field.into()] }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
