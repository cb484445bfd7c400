use crate::error::{AuditError, AuditResult};
use serde::{Deserialize, Serialize};

// ── Local-density model ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDensityConfig {
    pub n_neighbors: usize,
    /// Expected outlier share, in (0, 1].
    pub contamination: f64,
}

impl Default for LocalDensityConfig {
    fn default() -> Self {
        Self { n_neighbors: 20, contamination: 0.01 }
    }
}

// ── Isolation model ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub n_estimators: usize,
    pub contamination: f64,
    /// Per-tree subsample size; capped at the partition size.
    pub max_samples: usize,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self { n_estimators: 300, contamination: 0.01, max_samples: 256 }
    }
}

// ── Priority weighting ─────────────────────────────────────────────

/// Fixed policy: statistical strangeness dominates the ranking, the
/// amount term keeps near-zero anomalies below material ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub technical: f64,
    pub financial: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self { technical: 0.7, financial: 0.3 }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub local_density: LocalDensityConfig,
    pub isolation: IsolationConfig,
    pub seed: u64,
    /// Std-dev of the Gaussian noise added to scaled features before fitting.
    pub jitter_std: f64,
    pub weights: PriorityWeights,
    /// Worker threads for model fitting. `None` uses every core.
    pub parallelism: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            local_density: LocalDensityConfig::default(),
            isolation: IsolationConfig::default(),
            seed: 42,
            jitter_std: 1e-5,
            weights: PriorityWeights::default(),
            parallelism: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Small forests and neighbourhoods for fast tests.
    pub fn default_test() -> Self {
        Self {
            local_density: LocalDensityConfig { n_neighbors: 10, contamination: 0.05 },
            isolation: IsolationConfig { n_estimators: 60, contamination: 0.05, max_samples: 128 },
            seed: 7,
            parallelism: Some(2),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> AuditResult<()> {
        check_fraction("local_density.contamination", self.local_density.contamination)?;
        check_fraction("isolation.contamination", self.isolation.contamination)?;
        if self.local_density.n_neighbors == 0 {
            return Err(invalid("local_density.n_neighbors", "must be at least 1"));
        }
        if self.isolation.n_estimators == 0 {
            return Err(invalid("isolation.n_estimators", "must be at least 1"));
        }
        if self.isolation.max_samples < 2 {
            return Err(invalid("isolation.max_samples", "must be at least 2"));
        }
        if !(self.jitter_std.is_finite() && self.jitter_std >= 0.0) {
            return Err(invalid("jitter_std", "must be a finite non-negative number"));
        }
        for (field, w) in [
            ("weights.technical", self.weights.technical),
            ("weights.financial", self.weights.financial),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(invalid(field, "must be a finite non-negative number"));
            }
        }
        if self.parallelism == Some(0) {
            return Err(invalid("parallelism", "must be at least 1 when set"));
        }
        Ok(())
    }
}

fn check_fraction(field: &str, value: f64) -> AuditResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, &format!("{value} is outside (0, 1]")))
    }
}

fn invalid(field: &str, reason: &str) -> AuditError {
    AuditError::InvalidConfig { field: field.to_string(), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.local_density.n_neighbors, 20);
        assert_eq!(c.isolation.n_estimators, 300);
        assert_eq!(c.weights, PriorityWeights { technical: 0.7, financial: 0.3 });
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: PipelineConfig =
            serde_json::from_str(r#"{ "seed": 9, "isolation": { "n_estimators": 50 } }"#).unwrap();
        assert_eq!(c.seed, 9);
        assert_eq!(c.isolation.n_estimators, 50);
        assert_eq!(c.isolation.contamination, 0.01);
        assert_eq!(c.local_density, LocalDensityConfig::default());
    }

    #[test]
    fn contamination_outside_unit_interval_rejected() {
        let mut c = PipelineConfig::default();
        c.local_density.contamination = 0.0;
        assert!(matches!(c.validate(), Err(AuditError::InvalidConfig { .. })));
        c.local_density.contamination = 1.0;
        assert!(c.validate().is_ok());
        c.isolation.contamination = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_threads_rejected() {
        let c = PipelineConfig { parallelism: Some(0), ..PipelineConfig::default() };
        assert!(c.validate().is_err());
    }
}
