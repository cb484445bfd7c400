//! The cleaned transaction record consumed by the pipeline.

use chrono::NaiveDate;
use serde::Serialize;

/// Description value the portal publishes in place of redacted
/// transactions (legal or judicial confidentiality).
pub const CONFIDENTIAL_SENTINEL: &str = "Informações protegidas por sigilo";

pub fn is_confidential_description(description: &str) -> bool {
    description == CONFIDENTIAL_SENTINEL
}

/// One card transaction after cleaning and type coercion.
///
/// Only constructible through [`TransactionRecord::new`], so the
/// confidentiality flag can never disagree with the description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub superior_agency: String,
    pub agency: String,
    pub managing_unit: String,
    pub cardholder_document: String,
    pub cardholder_name: String,
    pub beneficiary_document: String,
    pub beneficiary_name: String,
    pub transaction_type: String,
    pub transaction_date: Option<NaiveDate>,
    pub amount: f64,
    pub statement_year: i32,
    pub statement_month: u32,
    pub source_file: String,
    confidential: bool,
}

impl TransactionRecord {
    /// Build a record, deriving the confidentiality flag from the
    /// description field.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        superior_agency: String,
        agency: String,
        managing_unit: String,
        cardholder_document: String,
        cardholder_name: String,
        beneficiary_document: String,
        beneficiary_name: String,
        transaction_type: String,
        transaction_date: Option<NaiveDate>,
        amount: f64,
        statement_year: i32,
        statement_month: u32,
        source_file: String,
    ) -> Self {
        let confidential = is_confidential_description(&transaction_type);
        Self {
            superior_agency,
            agency,
            managing_unit,
            cardholder_document,
            cardholder_name,
            beneficiary_document,
            beneficiary_name,
            transaction_type,
            transaction_date,
            amount,
            statement_year,
            statement_month,
            source_file,
            confidential,
        }
    }

    pub fn is_confidential(&self) -> bool {
        self.confidential
    }

    /// Cardholder identity: document plus name, since documents are
    /// partially masked in the published data.
    pub fn cardholder_key(&self) -> String {
        format!("{}{}", self.cardholder_document, self.cardholder_name)
    }
}
