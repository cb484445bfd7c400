//! Shared primitive types used across the entire pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable sequential identifier assigned to a row after the ensemble
/// partitions are concatenated. Used as the join key between models.
pub type RowId = u64;

/// The canonical run identifier.
pub type RunId = String;

/// One of the 27 Brazilian federative units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateCode {
    AC, AL, AP, AM, BA, CE, DF, ES, GO, MA, MT, MS, MG, PB,
    PR, PA, PE, PI, RJ, RN, RS, RO, RR, SC, SP, SE, TO,
}

impl StateCode {
    /// All codes, in declaration order.
    pub const ALL: [StateCode; 27] = [
        Self::AC, Self::AL, Self::AP, Self::AM, Self::BA, Self::CE, Self::DF,
        Self::ES, Self::GO, Self::MA, Self::MT, Self::MS, Self::MG, Self::PB,
        Self::PR, Self::PA, Self::PE, Self::PI, Self::RJ, Self::RN, Self::RS,
        Self::RO, Self::RR, Self::SC, Self::SP, Self::SE, Self::TO,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AC => "AC", Self::AL => "AL", Self::AP => "AP", Self::AM => "AM",
            Self::BA => "BA", Self::CE => "CE", Self::DF => "DF", Self::ES => "ES",
            Self::GO => "GO", Self::MA => "MA", Self::MT => "MT", Self::MS => "MS",
            Self::MG => "MG", Self::PB => "PB", Self::PR => "PR", Self::PA => "PA",
            Self::PE => "PE", Self::PI => "PI", Self::RJ => "RJ", Self::RN => "RN",
            Self::RS => "RS", Self::RO => "RO", Self::RR => "RR", Self::SC => "SC",
            Self::SP => "SP", Self::SE => "SE", Self::TO => "TO",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }
}

/// Inferred jurisdiction of a record. Never absent: when no state can be
/// inferred the record belongs to the federal `Union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Jurisdiction {
    State(StateCode),
    Union,
}

impl Jurisdiction {
    pub const UNION_LABEL: &'static str = "UNIAO";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State(code) => code.as_str(),
            Self::Union => Self::UNION_LABEL,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        if label == Self::UNION_LABEL {
            return Some(Self::Union);
        }
        StateCode::parse(label).map(Self::State)
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Jurisdiction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Jurisdiction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Jurisdiction::parse(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown jurisdiction label: {label}")))
    }
}

/// The two disjoint populations scored independently by the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Confidential,
    Ordinary,
}

impl Partition {
    /// Concatenation order used when the partitions are rejoined.
    pub const ORDER: [Partition; 2] = [Partition::Confidential, Partition::Ordinary];

    pub fn of(confidential: bool) -> Self {
        if confidential { Self::Confidential } else { Self::Ordinary }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Ordinary     => "ordinary",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two unsupervised detectors of the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LocalDensity,
    Isolation,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::LocalDensity, ModelKind::Isolation];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalDensity => "local_density",
            Self::Isolation    => "isolation",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discrete per-model verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierLabel {
    Inlier,
    Outlier,
}

impl OutlierLabel {
    pub fn is_outlier(&self) -> bool {
        matches!(self, Self::Outlier)
    }
}
