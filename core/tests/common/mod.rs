//! Shared fixtures: a small synthetic portal batch.

#![allow(dead_code)]

use cardaudit_core::{
    record::{TransactionRecord, CONFIDENTIAL_SENTINEL},
    rng::ModelRng,
};
use chrono::NaiveDate;

/// (agency, managing unit) pairs covering several inference rules.
pub const UNITS: &[(&str, &str)] = &[
    ("UNIVERSIDADE FEDERAL DE LAVRAS", "UFLA"),
    ("FUNDACAO UNIVERSIDADE FEDERAL", "CAMPO GRANDE - MT"),
    ("MINISTERIO DA DEFESA", "COMANDO DA 4A BRIGADA DE INFANTARIA"),
    ("INSTITUTO FEDERAL DO PA", "REITORIA"),
    ("POLICIA RODOVIARIA", "SUPERINTENDENCIA - BA"),
    ("AGENCIA", "ESCRITORIO RECIFE"),
];

const MERCHANTS: &[&str] = &[
    "PAPELARIA CENTRAL", "AUTO POSTO BR", "RESTAURANTE SABOR", "FERRAGENS SILVA",
    "HOTEL PLAZA", "MERCADO BOM PRECO",
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(rng: &mut ModelRng, i: usize, confidential: bool) -> TransactionRecord {
    let (agency, unit) = UNITS[rng.next_below(UNITS.len())];
    let month = 1 + rng.next_below(12) as u32;
    // Log-normal amounts with a heavy right tail.
    let mut amount = (rng.gaussian(5.0, 1.0)).exp();
    if i % 97 == 13 {
        amount *= 40.0;
    }
    let amount = (amount * 100.0).round() / 100.0;
    let holder = rng.next_below(25);

    let (kind, beneficiary, date) = if confidential {
        (CONFIDENTIAL_SENTINEL.to_string(), String::new(), None)
    } else {
        let day = 1 + rng.next_below(28) as u32;
        (
            "COMPRA A/V - R$ - APRES".to_string(),
            MERCHANTS[rng.next_below(MERCHANTS.len())].to_string(),
            NaiveDate::from_ymd_opt(2024, month, day),
        )
    };

    TransactionRecord::new(
        "MINISTERIO SUPERVISOR".to_string(),
        agency.to_string(),
        unit.to_string(),
        format!("***.{:03}.000-**", holder),
        format!("PORTADOR {holder}"),
        if confidential { String::new() } else { "12345678000190".to_string() },
        beneficiary,
        kind,
        date,
        amount,
        2024,
        month,
        "202401_CPGF.csv".to_string(),
    )
}

/// `ordinary` regular rows followed by `confidential` redacted rows,
/// interleaved deterministically from `seed`.
pub fn synthetic_batch(seed: u64, ordinary: usize, confidential: usize) -> Vec<TransactionRecord> {
    let mut rng = ModelRng::new(seed, 0).with_name("fixture");
    let mut flags: Vec<bool> = std::iter::repeat(false)
        .take(ordinary)
        .chain(std::iter::repeat(true).take(confidential))
        .collect();
    rng.shuffle(&mut flags);
    flags
        .into_iter()
        .enumerate()
        .map(|(i, c)| record(&mut rng, i, c))
        .collect()
}
