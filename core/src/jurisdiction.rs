//! Jurisdiction inference: maps noisy agency / managing-unit text to a
//! state code.
//!
//! RULES (fixed order, first match wins, on the uppercased text
//! "<agency> <managing unit>"):
//!   1. City / keyword table, raw substring, table order.
//!   2. Noise tokens ("SEDE", "PARADA") removed as whole words.
//!   3. Presidential-office phrases force DF.
//!   4. Preposition + state code ("DO PA", "EM SP"), whole word.
//!   5. State variants, table order: variants longer than 3 chars by
//!      substring, shorter ones as whole words, then the bare state code
//!      as a whole word before moving on to the next state.
//!   6. National / armed-forces terms -> Union.
//!   7. Otherwise Union.
//!
//! All tables are immutable static data handed to `JurisdictionRules::new`;
//! the rules hold no mutable state and are shared across threads.

use crate::{
    error::AuditResult,
    record::TransactionRecord,
    types::{Jurisdiction, StateCode},
};
use rayon::prelude::*;
use regex::Regex;

use StateCode::*;

/// Specific cities and institutions. Order matters: earlier keys win when
/// one key is a substring of the text matched by another.
pub static CITY_KEYWORDS: &[(&str, StateCode)] = &[
    // RJ
    ("RIO DE JANEIRO", RJ), ("NITEROI", RJ), ("SAO GONCALO", RJ),
    ("DUQUE DE CAXIAS", RJ), ("NOVA IGUACU", RJ), ("PETROPOLIS", RJ),
    ("VOLTA REDONDA", RJ), ("ANGRA DOS REIS", RJ), ("ITATIAIA", RJ),
    ("RESENDE", RJ), ("PARADA DE LUCAS", RJ), ("FLUMINENSE", RJ),
    ("PEDRO II", RJ), ("ILHA DAS FLORES", RJ), ("AGULHAS NEGRAS", RJ),
    // SP
    ("SAO PAULO", SP), ("GUARULHOS", SP), ("CAMPINAS", SP),
    ("SAO BERNARDO", SP), ("SANTO ANDRE", SP), ("OSASCO", SP),
    ("RIBEIRAO PRETO", SP), ("SOROCABA", SP), ("SANTOS", SP),
    ("SAO CARLOS", SP), ("TAUBATE", SP),
    // MG
    ("BELO HORIZONTE", MG), ("UBERLANDIA", MG), ("JUIZ DE FORA", MG),
    ("OURO PRETO", MG), ("LAVRAS", MG), ("ITAJUBA", MG), ("ALFENAS", MG),
    ("SAO JOAO DEL REI", MG), ("S.J.DEL-REI", MG), ("TRIANGULO MINEIRO", MG),
    // ES
    ("VITORIA", ES), ("VILA VELHA", ES),
    // RS
    ("PORTO ALEGRE", RS), ("CAXIAS DO SUL", RS), ("PELOTAS", RS),
    ("CANOAS", RS), ("SANTA MARIA", RS), ("RIO GRANDE", RS),
    ("CONCEICAO S/A", RS), ("PAMPA", RS),
    // PR
    ("CURITIBA", PR), ("LONDRINA", PR), ("MARINGA", PR),
    ("PONTA GROSSA", PR), ("CASCAVEL", PR), ("FOZ DO IGUACU", PR),
    // SC
    ("FLORIANOPOLIS", SC), ("JOINVILLE", SC), ("BLUMENAU", SC),
    ("CHAPECO", SC), ("ITAJAI", SC), ("RIO DO SUL", SC),
    ("CATARINENSE", SC),
    // Capitals and regional hubs
    ("BRASILIA", DF), ("MANAUS", AM), ("BELEM", PA), ("SANTAREM", PA),
    ("PORTO VELHO", RO), ("RIO BRANCO", AC), ("BOA VISTA", RR), ("MACAPA", AP),
    ("PALMAS", TO), ("SAO LUIS", MA), ("TERESINA", PI), ("FORTALEZA", CE),
    ("NATAL", RN), ("JOAO PESSOA", PB), ("RECIFE", PE), ("MACEIO", AL),
    ("ARACAJU", SE), ("SALVADOR", BA), ("FEIRA DE SANTANA", BA),
    ("GONCALO MONIZ", BA), ("CUIABA", MT), ("CAMPO GRANDE", MS),
    ("GOIANIA", GO), ("RIO VERDE", GO),
    // National institutions headquartered in Brasilia
    ("NACIONAL", DF), ("BRASILEIRA", DF), ("CENTRAL", DF), ("SUPERIOR", DF),
    ("CODEVASF", DF), ("FNDE", DF), ("INEP", DF), ("EBSERH", DF),
    ("SIT", DF), ("PARNAIBA", DF), ("VALES DO S.FRANC", DF),
    ("COMUNICACAO S.A", DF), ("RECURSOS MINERAIS", DF), ("DITEC/DPF", DF),
    ("INTELIGENCIA", DF), ("ABIN", DF), ("CNPQ", DF), ("CAPES", DF),
];

/// Textual variants per state. MS precedes MT because "MATO GROSSO" is a
/// prefix of "MATO GROSSO DO SUL"; PB and PR precede PA for the same reason.
pub static STATE_VARIANTS: &[(StateCode, &[&str])] = &[
    (AC, &["ACRE", "/AC", "- AC"]),
    (AL, &["ALAGOAS", "/AL", "- AL"]),
    (AP, &["AMAPA", "/AP", "- AP"]),
    (AM, &["AMAZONAS", "/AM", "- AM"]),
    (BA, &["BAHIA", "/BA", "- BA"]),
    (CE, &["CEARA", "/CE", "- CE"]),
    (DF, &["DISTRITO FEDERAL", "BRASILIA", "/DF", "- DF"]),
    (ES, &["ESPIRITO SANTO", "/ES", "- ES"]),
    (GO, &["GOIAS", "/GO", "- GO"]),
    (MA, &["MARANHAO", "/MA", "- MA"]),
    (MS, &["MATO GROSSO DO SUL", "/MS", "- MS"]),
    (MT, &["MATO GROSSO", "/MT", "- MT"]),
    (MG, &["MINAS GERAIS", "/MG", "- MG"]),
    (PB, &["PARAIBA", "/PB", "- PB"]),
    (PR, &["PARANA", "/PR", "- PR"]),
    (PA, &["PARA", "/PA", "- PA"]),
    (PE, &["PERNAMBUCO", "/PE", "- PE"]),
    (PI, &["PIAUI", "/PI", "- PI"]),
    (RJ, &["RIO DE JANEIRO", "/RJ", "- RJ"]),
    (RN, &["RIO GRANDE DO NORTE", "/RN", "- RN"]),
    (RS, &["RIO GRANDE DO SUL", "/RS", "- RS"]),
    (RO, &["RONDONIA", "/RO", "- RO"]),
    (RR, &["RORAIMA", "/RR", "- RR"]),
    (SC, &["SANTA CATARINA", "/SC", "- SC"]),
    (SP, &["SAO PAULO", "/SP", "- SP"]),
    (SE, &["SERGIPE", "/SE", "- SE"]),
    (TO, &["TOCANTINS", "/TO", "- TO"]),
];

/// Terms marking a nationwide or armed-forces entity.
pub static NATIONAL_TERMS: &[&str] = &[
    "FEDERAL", "NACIONAL", "BRASILEIRA", "REGIONAL", "SUDESTE", "NORDESTE",
    "BATALHAO", "COMANDO", "LOGISTICO", "INFANTARIA", "BRIGADA",
    "GRUPAMENTO", "SUPRIMENTO", "EXERCITO", "MARINHA", "AERONAUTICA",
];

pub static PRESIDENTIAL_PHRASES: &[&str] = &["PRESIDENCIA DA REPUBLICA", "GABINETE DE SEGURANCA"];

/// "SEDE" collides with the Sergipe code; "PARADA" with a city key.
pub static NOISE_TOKENS: &[&str] = &["SEDE", "PARADA"];

pub static PREPOSITIONS: &[&str] = &["NO", "NA", "DO", "DA", "DE", "EM", "AO"];

/// Variants at or below this length must match as whole words.
const WORD_MATCH_MAX_LEN: usize = 3;

/// The static lookup data the rules are compiled from.
#[derive(Debug, Clone, Copy)]
pub struct JurisdictionTables<'a> {
    pub cities: &'a [(&'a str, StateCode)],
    pub states: &'a [(StateCode, &'a [&'a str])],
    pub national_terms: &'a [&'a str],
    pub presidential_phrases: &'a [&'a str],
    pub noise_tokens: &'a [&'a str],
    pub prepositions: &'a [&'a str],
}

impl JurisdictionTables<'static> {
    pub fn standard() -> Self {
        Self {
            cities: CITY_KEYWORDS,
            states: STATE_VARIANTS,
            national_terms: NATIONAL_TERMS,
            presidential_phrases: PRESIDENTIAL_PHRASES,
            noise_tokens: NOISE_TOKENS,
            prepositions: PREPOSITIONS,
        }
    }
}

enum VariantMatcher {
    Substring(String),
    Word(Regex),
}

impl VariantMatcher {
    fn new(variant: &str) -> AuditResult<Self> {
        if variant.chars().count() > WORD_MATCH_MAX_LEN {
            return Ok(Self::Substring(variant.to_string()));
        }
        Ok(Self::Word(Regex::new(&word_pattern(variant)).map_err(anyhow::Error::from)?))
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Substring(s) => text.contains(s.as_str()),
            Self::Word(re) => re.is_match(text),
        }
    }
}

/// Whole-word pattern. A boundary is only required on a side that starts
/// or ends with a word character, so "/AC" matches in "UFAC/AC" and
/// " /AC" but not in "/ACRE".
fn word_pattern(token: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let left = if is_word(token.chars().next()) { r"\b" } else { "" };
    let right = if is_word(token.chars().last()) { r"\b" } else { "" };
    format!("{left}{}{right}", regex::escape(token))
}

/// Compiled, immutable inference rules.
pub struct JurisdictionRules {
    cities: Vec<(String, StateCode)>,
    noise: Vec<Regex>,
    presidential: Vec<String>,
    preposition: Regex,
    states: Vec<(StateCode, Vec<VariantMatcher>)>,
    national_terms: Vec<String>,
}

impl JurisdictionRules {
    pub fn new(tables: &JurisdictionTables<'_>) -> AuditResult<Self> {
        let noise = tables
            .noise_tokens
            .iter()
            .map(|t| Regex::new(&word_pattern(t)).map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>, _>>()?;

        let codes: Vec<&str> = tables.states.iter().map(|(code, _)| code.as_str()).collect();
        let preps: Vec<String> = tables.prepositions.iter().map(|p| regex::escape(p)).collect();
        let preposition = Regex::new(&format!(
            r"\b(?:{})\s+({})\b",
            preps.join("|"),
            codes.join("|")
        ))
        .map_err(anyhow::Error::from)?;

        let states = tables
            .states
            .iter()
            .map(|(code, variants)| {
                let matchers = variants
                    .iter()
                    .copied()
                    .chain(std::iter::once(code.as_str()))
                    .map(VariantMatcher::new)
                    .collect::<AuditResult<Vec<_>>>()?;
                Ok((*code, matchers))
            })
            .collect::<AuditResult<Vec<_>>>()?;

        Ok(Self {
            cities: tables.cities.iter().map(|(k, c)| (k.to_string(), *c)).collect(),
            noise,
            presidential: tables.presidential_phrases.iter().map(|p| p.to_string()).collect(),
            preposition,
            states,
            national_terms: tables.national_terms.iter().map(|t| t.to_string()).collect(),
        })
    }

    pub fn standard() -> AuditResult<Self> {
        Self::new(&JurisdictionTables::standard())
    }

    /// Infer the jurisdiction of one record from its agency and
    /// managing-unit names. Total: always returns a label.
    pub fn infer(&self, agency: &str, managing_unit: &str) -> Jurisdiction {
        self.explain(agency, managing_unit).jurisdiction
    }

    /// Like `infer`, also reporting which rule decided.
    pub fn explain(&self, agency: &str, managing_unit: &str) -> Inference {
        let mut text = format!("{agency} {managing_unit}").to_uppercase();

        for (key, code) in &self.cities {
            if text.contains(key.as_str()) {
                return Inference::state(*code, InferenceRule::CityKeyword);
            }
        }

        for re in &self.noise {
            if re.is_match(&text) {
                text = re.replace_all(&text, " ").into_owned();
            }
        }

        if self.presidential.iter().any(|p| text.contains(p.as_str())) {
            return Inference::state(StateCode::DF, InferenceRule::PresidentialOffice);
        }

        if let Some(code) = self
            .preposition
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| StateCode::parse(m.as_str()))
        {
            return Inference::state(code, InferenceRule::PrepositionCode);
        }

        for (code, matchers) in &self.states {
            if matchers.iter().any(|m| m.matches(&text)) {
                return Inference::state(*code, InferenceRule::StateVariant);
            }
        }

        let rule = if self.national_terms.iter().any(|t| text.contains(t.as_str())) {
            InferenceRule::NationalTerm
        } else {
            InferenceRule::Default
        };
        Inference { jurisdiction: Jurisdiction::Union, rule }
    }
}

/// Which rule produced an inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceRule {
    CityKeyword,
    PresidentialOffice,
    PrepositionCode,
    StateVariant,
    NationalTerm,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub jurisdiction: Jurisdiction,
    pub rule: InferenceRule,
}

impl Inference {
    fn state(code: StateCode, rule: InferenceRule) -> Self {
        Self { jurisdiction: Jurisdiction::State(code), rule }
    }
}

/// Label every record, in parallel. Output order matches input order.
pub fn infer_jurisdictions(
    rules: &JurisdictionRules,
    records: &[TransactionRecord],
) -> Vec<Jurisdiction> {
    records
        .par_iter()
        .map(|r| rules.infer(&r.agency, &r.managing_unit))
        .collect()
}
