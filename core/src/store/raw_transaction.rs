use super::AuditStore;
use crate::{
    clean::RawTransaction,
    error::{AuditError, AuditResult},
};
use rusqlite::{params, types::ValueRef, Row};
use std::collections::HashSet;

/// Columns a raw_transaction table must carry, in select order.
pub const RAW_TRANSACTION_COLUMNS: [&str; 13] = [
    "superior_agency",
    "agency",
    "managing_unit",
    "cardholder_document",
    "cardholder_name",
    "beneficiary_document",
    "beneficiary_name",
    "transaction_type",
    "statement_year",
    "statement_month",
    "transaction_date",
    "amount",
    "source_file",
];

// Imported tables are loosely typed; read any storage class as text.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    })
}

// A numeric amount cell is re-rendered in portal format ("10,5") so the
// cleaner does not read its decimal point as a thousands separator.
fn amount_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    match row.get_ref(idx)? {
        ValueRef::Real(f) => Ok(f.to_string().replace('.', ",")),
        _ => text(row, idx),
    }
}

impl AuditStore {
    // ── Raw transactions ───────────────────────────────────────

    pub fn insert_raw_transactions(&self, rows: &[RawTransaction]) -> AuditResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_transaction (
                    superior_agency, agency, managing_unit,
                    cardholder_document, cardholder_name,
                    beneficiary_document, beneficiary_name,
                    transaction_type, statement_year, statement_month,
                    transaction_date, amount, source_file
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.superior_agency,
                    r.agency,
                    r.managing_unit,
                    r.cardholder_document,
                    r.cardholder_name,
                    r.beneficiary_document,
                    r.beneficiary_name,
                    r.transaction_type,
                    r.statement_year,
                    r.statement_month,
                    r.transaction_date,
                    r.amount,
                    r.source_file,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Column names of `table`, empty when the table does not exist.
    pub fn table_columns(&self, table: &str) -> AuditResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let cols = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    /// Load every raw row in insertion order.
    ///
    /// Fails with a schema error naming every required column the
    /// table lacks.
    pub fn load_raw_transactions(&self) -> AuditResult<Vec<RawTransaction>> {
        let present: HashSet<String> = self.table_columns("raw_transaction")?.into_iter().collect();
        let missing: Vec<String> = RAW_TRANSACTION_COLUMNS
            .iter()
            .filter(|c| !present.contains(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AuditError::Schema { missing });
        }

        let sql = format!(
            "SELECT {} FROM raw_transaction ORDER BY rowid ASC",
            RAW_TRANSACTION_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawTransaction {
                    superior_agency:      text(row, 0)?,
                    agency:               text(row, 1)?,
                    managing_unit:        text(row, 2)?,
                    cardholder_document:  text(row, 3)?,
                    cardholder_name:      text(row, 4)?,
                    beneficiary_document: text(row, 5)?,
                    beneficiary_name:     text(row, 6)?,
                    transaction_type:     text(row, 7)?,
                    statement_year:       text(row, 8)?,
                    statement_month:      text(row, 9)?,
                    transaction_date:     text(row, 10)?,
                    amount:               amount_text(row, 11)?,
                    source_file:          text(row, 12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("store: loaded {} raw transactions", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_storage_is_read_as_text() {
        let store = AuditStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO raw_transaction (
                    superior_agency, agency, managing_unit, cardholder_document,
                    cardholder_name, beneficiary_document, beneficiary_name,
                    transaction_type, statement_year, statement_month,
                    transaction_date, amount, source_file
                ) VALUES ('A', 'B', 'C', NULL, 'N', '', '', 'T', 2024, 3, '01/03/2024', '10,50', 'f.csv')",
                [],
            )
            .unwrap();

        let rows = store.load_raw_transactions().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].statement_year, "2024");
        assert_eq!(rows[0].statement_month, "3");
        assert_eq!(rows[0].cardholder_document, "");
    }

    #[test]
    fn numeric_amounts_keep_their_decimals() {
        let store = AuditStore::in_memory().unwrap();
        store.migrate().unwrap();
        for amount in ["10.5", "1234.56", "80"] {
            store
                .conn
                .execute(
                    &format!(
                        "INSERT INTO raw_transaction (
                            superior_agency, agency, managing_unit, cardholder_document,
                            cardholder_name, beneficiary_document, beneficiary_name,
                            transaction_type, statement_year, statement_month,
                            transaction_date, amount, source_file
                        ) VALUES ('A', 'B', 'C', '', 'N', '', '', 'T', 2024, 3, '01/03/2024', {amount}, 'f.csv')"
                    ),
                    [],
                )
                .unwrap();
        }

        let rows = store.load_raw_transactions().unwrap();
        let amounts: Vec<&str> = rows.iter().map(|r| r.amount.as_str()).collect();
        assert_eq!(amounts, ["10,5", "1234,56", "80"]);

        let records = crate::clean::clean_transactions(&rows).unwrap();
        let parsed: Vec<f64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(parsed, [10.5, 1234.56, 80.0]);
    }
}
