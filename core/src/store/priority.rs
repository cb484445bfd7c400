use super::AuditStore;
use crate::{
    error::{AuditError, AuditResult},
    priority::{PriorityRecord, PriorityTable},
    record::TransactionRecord,
    types::{Jurisdiction, OutlierLabel},
};
use chrono::NaiveDate;
use rusqlite::params;

const PRIORITY_COLUMNS: &str = "row_id, superior_agency, agency, managing_unit,
    cardholder_document, cardholder_name, beneficiary_document, beneficiary_name,
    transaction_type, transaction_date, amount, statement_year, statement_month,
    source_file, jurisdiction, local_density_label, isolation_label,
    local_density_score, isolation_score, technical_score, financial_risk,
    priority_score";

fn label_text(label: OutlierLabel) -> &'static str {
    match label {
        OutlierLabel::Inlier => "inlier",
        OutlierLabel::Outlier => "outlier",
    }
}

fn parse_label(text: &str) -> AuditResult<OutlierLabel> {
    match text {
        "inlier" => Ok(OutlierLabel::Inlier),
        "outlier" => Ok(OutlierLabel::Outlier),
        other => Err(AuditError::Other(anyhow::anyhow!("unknown outlier label '{other}'"))),
    }
}

/// Columns as stored, before conversion back into domain types.
struct StoredRow {
    row_id: i64,
    text: [String; 8],
    date: Option<String>,
    amount: f64,
    year: i64,
    month: i64,
    source_file: String,
    jurisdiction: String,
    labels: (String, String),
    scores: [f64; 5],
}

impl StoredRow {
    fn into_record(self) -> AuditResult<PriorityRecord> {
        let [superior_agency, agency, managing_unit, cardholder_document, cardholder_name, beneficiary_document, beneficiary_name, transaction_type] =
            self.text;
        let transaction_date = match self.date {
            Some(d) => Some(NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| {
                AuditError::Other(anyhow::anyhow!("bad stored date '{d}': {e}"))
            })?),
            None => None,
        };
        let jurisdiction = Jurisdiction::parse(&self.jurisdiction).ok_or_else(|| {
            AuditError::Other(anyhow::anyhow!("unknown jurisdiction '{}'", self.jurisdiction))
        })?;
        let [local_density_score, isolation_score, technical_score, financial_risk, priority_score] = self.scores;
        Ok(PriorityRecord {
            row_id: self.row_id as u64,
            record: TransactionRecord::new(
                superior_agency,
                agency,
                managing_unit,
                cardholder_document,
                cardholder_name,
                beneficiary_document,
                beneficiary_name,
                transaction_type,
                transaction_date,
                self.amount,
                self.year as i32,
                self.month as u32,
                self.source_file,
            ),
            jurisdiction,
            local_density_label: parse_label(&self.labels.0)?,
            isolation_label: parse_label(&self.labels.1)?,
            local_density_score,
            isolation_score,
            technical_score,
            financial_risk,
            priority_score,
        })
    }
}

impl AuditStore {
    // ── Priority table ─────────────────────────────────────────

    /// Persist a ranked table; `rank` is the 1-based table position.
    pub fn save_priority_table(&self, run_id: &str, table: &PriorityTable) -> AuditResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO priority_record (run_id, rank, confidential, {PRIORITY_COLUMNS})
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)"
            ))?;
            for (rank, p) in table.records().iter().enumerate() {
                let r = &p.record;
                stmt.execute(params![
                    run_id,
                    rank as i64 + 1,
                    r.is_confidential(),
                    p.row_id as i64,
                    r.superior_agency,
                    r.agency,
                    r.managing_unit,
                    r.cardholder_document,
                    r.cardholder_name,
                    r.beneficiary_document,
                    r.beneficiary_name,
                    r.transaction_type,
                    r.transaction_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    r.amount,
                    r.statement_year,
                    r.statement_month,
                    r.source_file,
                    p.jurisdiction.as_str(),
                    label_text(p.local_density_label),
                    label_text(p.isolation_label),
                    p.local_density_score,
                    p.isolation_score,
                    p.technical_score,
                    p.financial_risk,
                    p.priority_score,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("store: saved {} priority rows for run {run_id}", table.len());
        Ok(())
    }

    fn query_priority(&self, run_id: &str, limit: i64) -> AuditResult<Vec<PriorityRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PRIORITY_COLUMNS} FROM priority_record
             WHERE run_id = ?1 ORDER BY rank ASC LIMIT ?2"
        ))?;
        let stored = stmt
            .query_map(params![run_id, limit], |row| {
                Ok(StoredRow {
                    row_id: row.get(0)?,
                    text: [
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                    ],
                    date: row.get(9)?,
                    amount: row.get(10)?,
                    year: row.get(11)?,
                    month: row.get(12)?,
                    source_file: row.get(13)?,
                    jurisdiction: row.get(14)?,
                    labels: (row.get(15)?, row.get(16)?),
                    scores: [row.get(17)?, row.get(18)?, row.get(19)?, row.get(20)?, row.get(21)?],
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        stored.into_iter().map(StoredRow::into_record).collect()
    }

    /// Reload a saved table. An unknown run yields an empty table.
    pub fn load_priority_table(&self, run_id: &str) -> AuditResult<PriorityTable> {
        // LIMIT -1 is unbounded in SQLite.
        Ok(PriorityTable::new(self.query_priority(run_id, -1)?))
    }

    /// The `n` highest-priority rows of a saved run, in rank order.
    pub fn top_priority(&self, run_id: &str, n: usize) -> AuditResult<Vec<PriorityRecord>> {
        self.query_priority(run_id, n as i64)
    }
}
