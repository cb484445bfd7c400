//! Raw portal rows -> typed transaction records.
//!
//! The transparency portal exports every column as text: dates as
//! dd/mm/yyyy and amounts in Brazilian number format ("1.234,56").

use crate::{
    error::{AuditError, AuditResult},
    record::TransactionRecord,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One exported row, untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTransaction {
    pub superior_agency: String,
    pub agency: String,
    pub managing_unit: String,
    pub cardholder_document: String,
    pub cardholder_name: String,
    pub beneficiary_document: String,
    pub beneficiary_name: String,
    pub transaction_type: String,
    pub statement_year: String,
    pub statement_month: String,
    pub transaction_date: String,
    pub amount: String,
    pub source_file: String,
}

/// Parse "1.234,56" -> 1234.56. Empty or unparsable text yields 0.0.
pub fn parse_brl_amount(text: &str) -> f64 {
    let normalized = text.trim().replace('.', "").replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parse "dd/mm/yyyy". Anything else (including the empty dates of
/// confidential rows) yields `None`.
pub fn parse_br_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%d/%m/%Y").ok()
}

/// Coerce types, reject rows missing required text, and drop exact
/// duplicates (first occurrence wins).
pub fn clean_transactions(raw: &[RawTransaction]) -> AuditResult<Vec<TransactionRecord>> {
    let mut seen: HashSet<&RawTransaction> = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());
    let mut duplicates = 0usize;

    for (row, r) in raw.iter().enumerate() {
        if !seen.insert(r) {
            duplicates += 1;
            continue;
        }
        records.push(clean_row(row, r)?);
    }

    if duplicates > 0 {
        log::debug!("clean: dropped {duplicates} duplicate rows");
    }
    log::info!("clean: {} of {} rows kept", records.len(), raw.len());
    Ok(records)
}

fn clean_row(row: usize, r: &RawTransaction) -> AuditResult<TransactionRecord> {
    let required = [
        ("superior_agency", &r.superior_agency),
        ("agency", &r.agency),
        ("managing_unit", &r.managing_unit),
        ("transaction_type", &r.transaction_type),
    ];
    let missing: Vec<String> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("{name} (row {row})"))
        .collect();
    if !missing.is_empty() {
        return Err(AuditError::Schema { missing });
    }

    let statement_year: i32 = r.statement_year.trim().parse().map_err(|_| AuditError::InvalidValue {
        field: "statement_year".into(),
        row,
        reason: format!("not an integer: '{}'", r.statement_year),
    })?;
    let statement_month: u32 = r
        .statement_month
        .trim()
        .parse()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| AuditError::InvalidValue {
            field: "statement_month".into(),
            row,
            reason: format!("not a month number: '{}'", r.statement_month),
        })?;

    let amount = parse_brl_amount(&r.amount);
    if amount < 0.0 {
        return Err(AuditError::InvalidValue {
            field: "amount".into(),
            row,
            reason: format!("negative amount {amount}"),
        });
    }

    Ok(TransactionRecord::new(
        r.superior_agency.clone(),
        r.agency.clone(),
        r.managing_unit.clone(),
        r.cardholder_document.clone(),
        r.cardholder_name.clone(),
        r.beneficiary_document.clone(),
        r.beneficiary_name.clone(),
        r.transaction_type.clone(),
        parse_br_date(&r.transaction_date),
        amount,
        statement_year,
        statement_month,
        r.source_file.clone(),
    ))
}
