mod common;

use cardaudit_core::{
    jurisdiction::{infer_jurisdictions, InferenceRule, JurisdictionRules},
    types::{Jurisdiction, StateCode},
};

fn rules() -> JurisdictionRules {
    JurisdictionRules::standard().expect("standard tables compile")
}

#[test]
fn city_keyword_beats_state_suffix() {
    let r = rules();
    let inf = r.explain("FUNDACAO UNIVERSIDADE FEDERAL", "CAMPO GRANDE - MT");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::MS));
    assert_eq!(inf.rule, InferenceRule::CityKeyword);
}

#[test]
fn preposition_code_needs_a_word_boundary() {
    let r = rules();
    let inf = r.explain("ORGAO DO PA", "");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::PA));
    assert_eq!(inf.rule, InferenceRule::PrepositionCode);

    let inf = r.explain("ORGAOPA", "");
    assert_eq!(inf.jurisdiction, Jurisdiction::Union);
    assert_eq!(inf.rule, InferenceRule::Default);
}

#[test]
fn military_units_fall_back_to_union() {
    let inf = rules().explain("MINISTERIO DA DEFESA", "COMANDO DA 4A BRIGADA DE INFANTARIA");
    assert_eq!(inf.jurisdiction, Jurisdiction::Union);
    assert_eq!(inf.rule, InferenceRule::NationalTerm);
}

#[test]
fn matching_is_case_insensitive() {
    let r = rules();
    assert_eq!(r.infer("universidade federal de lavras", "ufla"), Jurisdiction::State(StateCode::MG));
}

#[test]
fn every_record_gets_a_label_in_input_order() {
    common::init_logging();
    let records = common::synthetic_batch(5, 120, 20);
    let r = rules();

    let labels = infer_jurisdictions(&r, &records);
    assert_eq!(labels.len(), records.len());
    for (rec, label) in records.iter().zip(&labels) {
        assert_eq!(*label, r.infer(&rec.agency, &rec.managing_unit));
    }

    // Deterministic across calls.
    assert_eq!(labels, infer_jurisdictions(&r, &records));
}

#[test]
fn labels_serialize_as_codes() {
    let json = serde_json::to_string(&[Jurisdiction::State(StateCode::SP), Jurisdiction::Union]).unwrap();
    assert_eq!(json, r#"["SP","UNIAO"]"#);
    let back: Vec<Jurisdiction> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, vec![Jurisdiction::State(StateCode::SP), Jurisdiction::Union]);
}

#[test]
fn city_lookup_runs_before_anything_else() {
    let inf = rules().explain("UNIDADE GESTORA", "CAMPO GRANDE SUPERINTENDENCIA");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::MS));
    assert_eq!(inf.rule, InferenceRule::CityKeyword);
}

#[test]
fn bare_state_code_matches_as_a_word() {
    let r = rules();
    let inf = r.explain("SUPERINTENDENCIA REGIONAL", "MG");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::MG));
    assert_eq!(inf.rule, InferenceRule::StateVariant);

    let inf = r.explain("ESCRITORIO", "SP");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::SP));
    assert_eq!(inf.rule, InferenceRule::StateVariant);

    // Inside a longer word the code does not count.
    assert_eq!(r.explain("ESCRITORIO", "MGX").rule, InferenceRule::Default);
}

#[test]
fn noise_tokens_are_stripped_before_state_matching() {
    let r = rules();
    // "PARADA" would otherwise hit PA through "PARA".
    let inf = r.explain("ORGAO X", "PONTO DE PARADA");
    assert_eq!(inf.jurisdiction, Jurisdiction::Union);
    assert_eq!(inf.rule, InferenceRule::Default);

    let inf = r.explain("ORGAO X", "UNIDADE - SEDE");
    assert_eq!(inf.jurisdiction, Jurisdiction::Union);
    assert_eq!(inf.rule, InferenceRule::Default);
}

#[test]
fn presidential_phrase_beats_a_state_variant() {
    let r = rules();
    let inf = r.explain("PRESIDENCIA DA REPUBLICA", "ESCRITORIO SP");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::DF));
    assert_eq!(inf.rule, InferenceRule::PresidentialOffice);

    let inf = r.explain("GABINETE DE SEGURANCA", "MINAS GERAIS");
    assert_eq!(inf.jurisdiction, Jurisdiction::State(StateCode::DF));
    assert_eq!(inf.rule, InferenceRule::PresidentialOffice);
}
