//! Feature engineering and preparation.
//!
//! Engineering runs once over the whole batch (frequencies and group
//! means are batch-wide). Preparation runs per partition: it selects the
//! model columns and rescales each one with a median/IQR scaler fitted on
//! that partition, so extreme amounts do not set the scale the outlier
//! models see.

use crate::{
    error::{AuditError, AuditResult},
    record::TransactionRecord,
    rng::ModelRng,
    stats::percentile_sorted,
    types::Jurisdiction,
};
use chrono::{Datelike, Weekday};
use std::collections::HashMap;

/// Every numeric column produced by feature engineering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    LogAmount,
    MonthRatio,
    StatementYear,
    StatementMonth,
    AgencyFrequency,
    JurisdictionFrequency,
    Confidential,
    Weekend,
    BeneficiaryFrequency,
    AgencyMonthMean,
}

impl FeatureColumn {
    pub const COUNT: usize = 10;

    pub const ALL: [FeatureColumn; Self::COUNT] = [
        Self::LogAmount,
        Self::MonthRatio,
        Self::StatementYear,
        Self::StatementMonth,
        Self::AgencyFrequency,
        Self::JurisdictionFrequency,
        Self::Confidential,
        Self::Weekend,
        Self::BeneficiaryFrequency,
        Self::AgencyMonthMean,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LogAmount             => "log_amount",
            Self::MonthRatio            => "month_ratio",
            Self::StatementYear         => "statement_year",
            Self::StatementMonth        => "statement_month",
            Self::AgencyFrequency       => "agency_frequency",
            Self::JurisdictionFrequency => "jurisdiction_frequency",
            Self::Confidential          => "confidential",
            Self::Weekend               => "weekend",
            Self::BeneficiaryFrequency  => "beneficiary_frequency",
            Self::AgencyMonthMean       => "agency_month_mean",
        }
    }
}

/// Columns fed to the outlier models, in matrix column order.
pub const MODEL_FEATURES: [FeatureColumn; 8] = [
    FeatureColumn::LogAmount,
    FeatureColumn::MonthRatio,
    FeatureColumn::StatementYear,
    FeatureColumn::StatementMonth,
    FeatureColumn::AgencyFrequency,
    FeatureColumn::JurisdictionFrequency,
    FeatureColumn::Confidential,
    FeatureColumn::Weekend,
];

/// Engineered but deliberately kept out of the models: the beneficiary
/// frequency is empty for confidential rows, and the group mean is
/// already carried by the month ratio.
pub const EXCLUDED_FEATURES: [FeatureColumn; 2] = [
    FeatureColumn::BeneficiaryFrequency,
    FeatureColumn::AgencyMonthMean,
];

/// One row of the engineered table, aligned with the input record.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    pub cardholder_key: String,
    values: [f64; FeatureColumn::COUNT],
}

impl EngineeredRecord {
    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.values[column.index()]
    }
}

/// Derive all engineered columns for the batch.
pub fn engineer_features(
    records: &[TransactionRecord],
    jurisdictions: &[Jurisdiction],
) -> AuditResult<Vec<EngineeredRecord>> {
    if records.len() != jurisdictions.len() {
        return Err(AuditError::Other(anyhow::anyhow!(
            "feature engineering: {} records but {} jurisdiction labels",
            records.len(),
            jurisdictions.len()
        )));
    }
    let n = records.len() as f64;

    let agency_freq = frequencies(records.iter().map(|r| r.agency.as_str()));
    let jurisdiction_freq = frequencies(jurisdictions.iter().map(|j| j.as_str()));
    let beneficiary_freq = frequencies(records.iter().map(|r| r.beneficiary_name.as_str()));

    let mut group_sums: HashMap<(&str, i32, u32), (f64, usize)> = HashMap::new();
    for r in records {
        let entry = group_sums
            .entry((r.agency.as_str(), r.statement_year, r.statement_month))
            .or_insert((0.0, 0));
        entry.0 += r.amount;
        entry.1 += 1;
    }

    let engineered = records
        .iter()
        .zip(jurisdictions)
        .map(|(r, j)| {
            let (sum, count) = group_sums[&(r.agency.as_str(), r.statement_year, r.statement_month)];
            let group_mean = sum / count as f64;
            let month_ratio = if group_mean > 0.0 { r.amount / group_mean } else { 1.0 };
            let weekend = !r.is_confidential()
                && r.transaction_date
                    .is_some_and(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun));

            let mut values = [0.0; FeatureColumn::COUNT];
            values[FeatureColumn::LogAmount.index()] = r.amount.ln_1p();
            values[FeatureColumn::MonthRatio.index()] = month_ratio;
            values[FeatureColumn::StatementYear.index()] = f64::from(r.statement_year);
            values[FeatureColumn::StatementMonth.index()] = f64::from(r.statement_month);
            values[FeatureColumn::AgencyFrequency.index()] = agency_freq[r.agency.as_str()] as f64 / n;
            values[FeatureColumn::JurisdictionFrequency.index()] = jurisdiction_freq[j.as_str()] as f64 / n;
            values[FeatureColumn::Confidential.index()] = if r.is_confidential() { 1.0 } else { 0.0 };
            values[FeatureColumn::Weekend.index()] = if weekend { 1.0 } else { 0.0 };
            values[FeatureColumn::BeneficiaryFrequency.index()] =
                beneficiary_freq[r.beneficiary_name.as_str()] as f64 / n;
            values[FeatureColumn::AgencyMonthMean.index()] = group_mean;

            EngineeredRecord { cardholder_key: r.cardholder_key(), values }
        })
        .collect();

    Ok(engineered)
}

fn frequencies<'a>(keys: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for k in keys {
        *counts.entry(k).or_insert(0) += 1;
    }
    counts
}

/// Dense row-major numeric matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl FeatureMatrix {
    pub fn from_rows(rows: &[Vec<f64>]) -> AuditResult<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(AuditError::Other(anyhow::anyhow!("ragged feature rows")));
        }
        Ok(Self {
            data: rows.iter().flatten().copied().collect(),
            n_rows: rows.len(),
            n_cols,
        })
    }

    pub fn empty(n_cols: usize) -> Self {
        Self { data: Vec::new(), n_rows: 0, n_cols }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|r| self.get(r, col)).collect()
    }

    /// Copy with independent N(0, std) noise added to every cell.
    pub fn with_jitter(&self, rng: &mut ModelRng, std: f64) -> Self {
        if std == 0.0 {
            return self.clone();
        }
        Self {
            data: self.data.iter().map(|v| v + rng.gaussian(0.0, std)).collect(),
            ..*self
        }
    }
}

/// Median / interquartile-range scaler, one centre and scale per column.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustScaler {
    centers: Vec<f64>,
    scales: Vec<f64>,
}

impl RobustScaler {
    pub fn fit(matrix: &FeatureMatrix) -> Self {
        let (centers, scales) = (0..matrix.n_cols())
            .map(|c| {
                let mut col = matrix.column(c);
                if col.is_empty() {
                    return (0.0, 1.0);
                }
                col.sort_by(f64::total_cmp);
                let iqr = percentile_sorted(&col, 0.75) - percentile_sorted(&col, 0.25);
                (percentile_sorted(&col, 0.5), if iqr > 0.0 { iqr } else { 1.0 })
            })
            .unzip();
        Self { centers, scales }
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        let n_cols = matrix.n_cols();
        let data = matrix
            .data
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let c = i % n_cols;
                (v - self.centers[c]) / self.scales[c]
            })
            .collect();
        FeatureMatrix { data, ..*matrix }
    }
}

/// Select the model columns for one partition and robust-scale them.
pub fn prepare_features(rows: &[&EngineeredRecord]) -> FeatureMatrix {
    if rows.is_empty() {
        return FeatureMatrix::empty(MODEL_FEATURES.len());
    }
    let raw = FeatureMatrix {
        data: rows
            .iter()
            .flat_map(|r| MODEL_FEATURES.iter().map(|c| r.get(*c)))
            .collect(),
        n_rows: rows.len(),
        n_cols: MODEL_FEATURES.len(),
    };
    RobustScaler::fit(&raw).transform(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn record(agency: &str, amount: f64, date: Option<NaiveDate>, kind: &str) -> TransactionRecord {
        TransactionRecord::new(
            "MINISTERIO".into(),
            agency.into(),
            "UG".into(),
            "***.111.222-**".into(),
            "JOAO".into(),
            "1".into(),
            "LOJA".into(),
            kind.into(),
            date,
            amount,
            2024,
            5,
            "f.csv".into(),
        )
    }

    #[test]
    fn column_policy_covers_every_column_once() {
        let model: HashSet<_> = MODEL_FEATURES.iter().collect();
        let excluded: HashSet<_> = EXCLUDED_FEATURES.iter().collect();
        assert!(model.is_disjoint(&excluded));
        assert_eq!(model.len() + excluded.len(), FeatureColumn::ALL.len());
        for c in FeatureColumn::ALL.iter() {
            assert!(model.contains(c) || excluded.contains(c), "{} unassigned", c.name());
        }
    }

    #[test]
    fn ratio_and_frequencies() {
        let records = vec![
            record("A", 100.0, None, "COMPRA"),
            record("A", 300.0, None, "COMPRA"),
            record("B", 0.0, None, "COMPRA"),
        ];
        let labels = vec![Jurisdiction::Union; 3];
        let eng = engineer_features(&records, &labels).unwrap();
        assert!((eng[0].get(FeatureColumn::MonthRatio) - 0.5).abs() < 1e-12);
        assert!((eng[1].get(FeatureColumn::MonthRatio) - 1.5).abs() < 1e-12);
        assert_eq!(eng[2].get(FeatureColumn::MonthRatio), 1.0);
        assert!((eng[0].get(FeatureColumn::AgencyFrequency) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eng[0].get(FeatureColumn::JurisdictionFrequency), 1.0);
        assert!((eng[1].get(FeatureColumn::LogAmount) - 301f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn weekend_flag_skips_confidential_rows() {
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 1);
        let records = vec![
            record("A", 1.0, saturday, "COMPRA"),
            record("A", 1.0, saturday, crate::record::CONFIDENTIAL_SENTINEL),
            record("A", 1.0, NaiveDate::from_ymd_opt(2024, 6, 3), "COMPRA"),
        ];
        let eng = engineer_features(&records, &[Jurisdiction::Union; 3]).unwrap();
        assert_eq!(eng[0].get(FeatureColumn::Weekend), 1.0);
        assert_eq!(eng[1].get(FeatureColumn::Weekend), 0.0);
        assert_eq!(eng[1].get(FeatureColumn::Confidential), 1.0);
        assert_eq!(eng[2].get(FeatureColumn::Weekend), 0.0);
    }

    #[test]
    fn robust_scaler_centres_on_median() {
        let m = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![1000.0]]).unwrap();
        let scaled = RobustScaler::fit(&m).transform(&m);
        // median 3, IQR 4 - 2 = 2
        assert_eq!(scaled.get(2, 0), 0.0);
        assert_eq!(scaled.get(0, 0), -1.0);
        assert!((scaled.get(4, 0) - 498.5).abs() < 1e-9);
    }

    #[test]
    fn constant_column_is_only_centred() {
        let m = FeatureMatrix::from_rows(&[vec![7.0], vec![7.0]]).unwrap();
        let scaled = RobustScaler::fit(&m).transform(&m);
        assert_eq!(scaled.column(0), vec![0.0, 0.0]);
    }

    #[test]
    fn mismatched_labels_rejected() {
        let records = vec![record("A", 1.0, None, "COMPRA")];
        assert!(engineer_features(&records, &[]).is_err());
    }
}
