//! Feature schema and extraction.
//!
//! Training and live scoring share one schema: [`FeatureParts`] is the only way to build a
//! [`FeatureVector`], and both the extractor (from a [`PatientRecord`]) and the dataset loader
//! (from a CSV row) go through it. The vector is therefore always complete and in
//! [`FEATURE_NAMES`] order.

use crate::constants::{MAX_AGE_YEARS, MAX_DAYS_SINCE_ADMISSION};
use crate::patient::{ClinicalList, PatientRecord};
use crate::vocabulary::HighRiskVocabulary;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 11;

/// Feature order the extractor produces and every compatible artifact was trained with.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age_years",
    "days_since_admission",
    "medication_count",
    "current_prescription_count",
    "allergy_count",
    "high_risk_allergy_count",
    "history_count",
    "high_risk_history_count",
    "past_history_count",
    "high_risk_prescription_count",
    "gender",
];

/// Levels of the categorical `gender` feature, indexed by [`Gender::code`].
pub const GENDER_LEVELS: [&str; 3] = ["female", "male", "other"];

const GENDER_INDEX: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Categorical(&'static [&'static str]),
}

/// How the feature at `index` is encoded.
pub fn feature_kind(index: usize) -> FeatureKind {
    if index == GENDER_INDEX {
        FeatureKind::Categorical(&GENDER_LEVELS)
    } else {
        FeatureKind::Numeric
    }
}

/// The schema as owned strings, in the form stored in artifacts.
pub fn feature_order() -> Vec<String> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    #[default]
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "f" | "female" | "woman" => Gender::Female,
            "m" | "male" | "man" => Gender::Male,
            _ => Gender::Other,
        }
    }

    pub fn code(self) -> usize {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
            Gender::Other => 2,
        }
    }

    pub fn label(self) -> &'static str {
        GENDER_LEVELS[self.code()]
    }
}

/// Admission state. Carried alongside the model features for the heuristic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Discharged,
    Critical,
    #[default]
    Unknown,
}

impl PatientStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => PatientStatus::Active,
            "discharged" => PatientStatus::Discharged,
            "critical" => PatientStatus::Critical,
            _ => PatientStatus::Unknown,
        }
    }
}

/// Named inputs of a feature vector. Unset fields default to zero / [`Gender::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureParts {
    pub age_years: f64,
    pub days_since_admission: f64,
    pub medication_count: f64,
    pub current_prescription_count: f64,
    pub allergy_count: f64,
    pub high_risk_allergy_count: f64,
    pub history_count: f64,
    pub high_risk_history_count: f64,
    pub past_history_count: f64,
    pub high_risk_prescription_count: f64,
    pub gender: Gender,
}

/// Fixed-order numeric encoding of one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
    status: PatientStatus,
}

impl FeatureVector {
    pub fn new(parts: FeatureParts, status: PatientStatus) -> Self {
        fn finite(value: f64) -> f64 {
            if value.is_finite() {
                value.max(0.0)
            } else {
                0.0
            }
        }

        Self {
            values: [
                finite(parts.age_years),
                finite(parts.days_since_admission),
                finite(parts.medication_count),
                finite(parts.current_prescription_count),
                finite(parts.allergy_count),
                finite(parts.high_risk_allergy_count),
                finite(parts.history_count),
                finite(parts.high_risk_history_count),
                finite(parts.past_history_count),
                finite(parts.high_risk_prescription_count),
                parts.gender.code() as f64,
            ],
            status,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }

    /// Feature name and value pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn gender(&self) -> Gender {
        match self.values[GENDER_INDEX] as usize {
            0 => Gender::Female,
            1 => Gender::Male,
            _ => Gender::Other,
        }
    }

    pub fn status(&self) -> PatientStatus {
        self.status
    }
}

/// Maps patient records onto the feature schema using a high-risk vocabulary.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    vocabulary: HighRiskVocabulary,
}

impl FeatureExtractor {
    pub fn new(vocabulary: HighRiskVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &HighRiskVocabulary {
        &self.vocabulary
    }

    /// Builds the feature vector for `record` as of `now`.
    ///
    /// Never fails: unparseable dates count as absent and every count defaults to zero.
    pub fn extract(&self, record: &PatientRecord, now: DateTime<Utc>) -> FeatureVector {
        let today = now.date_naive();
        let vocab = &self.vocabulary;

        let age_years = record
            .date_of_birth
            .as_deref()
            .and_then(parse_date)
            .and_then(|dob| today.years_since(dob))
            .map(|years| years.min(MAX_AGE_YEARS))
            .unwrap_or(0);

        let days_since_admission = record
            .admission_date
            .as_deref()
            .and_then(parse_date)
            .map(|admitted| (today - admitted).num_days().clamp(0, MAX_DAYS_SINCE_ADMISSION))
            .unwrap_or(0);

        let high_risk_allergy_count = count_matching(&[&record.allergies], |entry| {
            vocab.is_high_risk_allergy(entry)
        });
        let high_risk_prescription_count = count_matching(
            &[&record.medications, &record.current_prescriptions],
            |entry| vocab.is_high_risk_medication(entry),
        );
        let high_risk_history_count = count_matching(
            &[&record.medical_history, &record.past_medical_history],
            |entry| vocab.is_high_risk_condition(entry),
        );

        let parts = FeatureParts {
            age_years: f64::from(age_years),
            days_since_admission: days_since_admission as f64,
            medication_count: record.medications.len() as f64,
            current_prescription_count: record.current_prescriptions.len() as f64,
            allergy_count: record.allergies.len() as f64,
            high_risk_allergy_count: high_risk_allergy_count as f64,
            history_count: record.medical_history.len() as f64,
            high_risk_history_count: high_risk_history_count as f64,
            past_history_count: record.past_medical_history.len() as f64,
            high_risk_prescription_count: high_risk_prescription_count as f64,
            gender: record
                .gender
                .as_deref()
                .map(Gender::parse)
                .unwrap_or_default(),
        };

        let status = record
            .status
            .as_deref()
            .map(PatientStatus::parse)
            .unwrap_or_default();

        FeatureVector::new(parts, status)
    }
}

fn count_matching(lists: &[&ClinicalList], is_match: impl Fn(&str) -> bool) -> usize {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|entry| is_match(entry))
        .count()
}

/// Parses ISO-like dates and date-times; anything else is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    fn sample_record() -> PatientRecord {
        PatientRecord {
            date_of_birth: Some("1954-01-20".into()),
            gender: Some("Female".into()),
            status: Some("active".into()),
            admission_date: Some("2026-03-11".into()),
            medications: ClinicalList::new(["Warfarin 5mg", "Paracetamol"]),
            current_prescriptions: ClinicalList::new(["Insulin glargine"]),
            allergies: ClinicalList::new(["Penicillin", "Pollen"]),
            medical_history: ClinicalList::new(["Heart failure", "Hypertension"]),
            past_medical_history: ClinicalList::new(["COPD"]),
        }
    }

    #[test]
    fn test_extract_counts_and_high_risk_subsets() {
        let extractor = FeatureExtractor::default();
        let fv = extractor.extract(&sample_record(), fixed_now());

        assert_eq!(fv.get("age_years"), Some(72.0));
        assert_eq!(fv.get("days_since_admission"), Some(4.0));
        assert_eq!(fv.get("medication_count"), Some(2.0));
        assert_eq!(fv.get("current_prescription_count"), Some(1.0));
        assert_eq!(fv.get("allergy_count"), Some(2.0));
        assert_eq!(fv.get("high_risk_allergy_count"), Some(1.0));
        assert_eq!(fv.get("history_count"), Some(2.0));
        assert_eq!(fv.get("high_risk_history_count"), Some(2.0));
        assert_eq!(fv.get("past_history_count"), Some(1.0));
        assert_eq!(fv.get("high_risk_prescription_count"), Some(2.0));
        assert_eq!(fv.gender(), Gender::Female);
        assert_eq!(fv.status(), PatientStatus::Active);
    }

    #[test]
    fn test_extract_empty_record_defaults() {
        let fv = FeatureExtractor::default().extract(&PatientRecord::default(), fixed_now());

        assert_eq!(fv.values().len(), FEATURE_COUNT);
        assert!(fv.values()[..GENDER_INDEX].iter().all(|v| *v == 0.0));
        assert_eq!(fv.gender(), Gender::Other);
        assert_eq!(fv.status(), PatientStatus::Unknown);
    }

    #[test]
    fn test_extract_is_reproducible_at_fixed_instant() {
        let extractor = FeatureExtractor::default();
        let record = sample_record();
        let first = extractor.extract(&record, fixed_now());
        let second = extractor.extract(&record, fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_future_admission_floors_at_zero() {
        let record = PatientRecord {
            admission_date: Some("2026-04-30".into()),
            date_of_birth: Some("2030-01-01".into()),
            ..Default::default()
        };
        let fv = FeatureExtractor::default().extract(&record, fixed_now());
        assert_eq!(fv.get("days_since_admission"), Some(0.0));
        assert_eq!(fv.get("age_years"), Some(0.0));
    }

    #[test]
    fn test_long_stay_and_age_are_clamped() {
        let record = PatientRecord {
            admission_date: Some("2025-01-01T08:00:00".into()),
            date_of_birth: Some("1850-01-01".into()),
            ..Default::default()
        };
        let fv = FeatureExtractor::default().extract(&record, fixed_now());
        assert_eq!(fv.get("days_since_admission"), Some(30.0));
        assert_eq!(fv.get("age_years"), Some(110.0));
    }

    #[test]
    fn test_malformed_dates_are_absent() {
        let record = PatientRecord {
            admission_date: Some("yesterday".into()),
            date_of_birth: Some("20/01/1954".into()),
            ..Default::default()
        };
        let fv = FeatureExtractor::default().extract(&record, fixed_now());
        assert_eq!(fv.get("days_since_admission"), Some(0.0));
        assert_eq!(fv.get("age_years"), Some(0.0));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 11);
        assert_eq!(parse_date("2026-03-11"), expected);
        assert_eq!(parse_date("2026-03-11 14:00:00"), expected);
        assert_eq!(parse_date("2026-03-11T14:00:00"), expected);
        assert_eq!(parse_date("2026-03-11T14:00:00+00:00"), expected);
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse(" M "), Gender::Male);
        assert_eq!(Gender::parse("woman"), Gender::Female);
        assert_eq!(Gender::parse("Unknown/Invalid"), Gender::Other);
        assert_eq!(Gender::Male.label(), "male");
    }

    #[test]
    fn test_feature_order_matches_names() {
        assert_eq!(feature_order().len(), FEATURE_COUNT);
        assert_eq!(feature_order()[GENDER_INDEX], "gender");
        assert_eq!(feature_kind(0), FeatureKind::Numeric);
        assert!(matches!(feature_kind(GENDER_INDEX), FeatureKind::Categorical(levels) if levels.len() == 3));
    }
}
