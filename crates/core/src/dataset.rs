//! Labeled training data from CSV.
//!
//! Each row goes through [`FeatureParts`] into the same [`FeatureVector`] schema the extractor
//! produces for live records. A column may use the native feature name or the equivalent column
//! of the UCI diabetes readmission export:
//!
//! | feature                | native column          | UCI column(s)                                          |
//! |------------------------|------------------------|--------------------------------------------------------|
//! | `age_years`            | `age_years`            | `age` (bracket such as `[70-80)`, midpoint used)       |
//! | `days_since_admission` | `days_since_admission` | `time_in_hospital`                                     |
//! | `medication_count`     | `medication_count`     | `num_medications`                                      |
//! | `history_count`        | `history_count`        | `number_diagnoses`                                     |
//! | `past_history_count`   | `past_history_count`   | `number_inpatient + number_outpatient + number_emergency` |
//!
//! The label comes from a `label` column or, failing that, `readmitted == "<30"`. Rows with
//! neither are dropped.

use crate::constants::{MAX_AGE_YEARS, MAX_DAYS_SINCE_ADMISSION};
use crate::error::{TrainingError, TrainingResult};
use crate::features::{FeatureParts, FeatureVector, Gender, PatientStatus};
use serde::Deserialize;
use std::path::Path;

/// Midpoint used when an age bracket cannot be parsed.
const DEFAULT_AGE_BRACKET_MIDPOINT: f64 = 45.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatasetRow {
    #[serde(deserialize_with = "csv::invalid_option")]
    age_years: Option<f64>,
    age: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    days_since_admission: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    time_in_hospital: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    medication_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    num_medications: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    current_prescription_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    allergy_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    high_risk_allergy_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    history_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    number_diagnoses: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    high_risk_history_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    past_history_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    number_inpatient: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    number_outpatient: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    number_emergency: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    high_risk_prescription_count: Option<f64>,
    gender: Option<String>,
    status: Option<String>,
    label: Option<String>,
    readmitted: Option<String>,
}

impl DatasetRow {
    fn label(&self) -> Option<bool> {
        let explicit = self
            .label
            .as_deref()
            .and_then(|raw| match raw.trim().to_lowercase().as_str() {
                "1" | "1.0" | "true" | "yes" => Some(true),
                "0" | "0.0" | "false" | "no" => Some(false),
                _ => None,
            });

        explicit.or_else(|| {
            self.readmitted
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .map(|raw| raw == "<30")
        })
    }

    fn features(&self) -> FeatureVector {
        let age_years = self
            .age_years
            .or_else(|| self.age.as_deref().map(age_bracket_midpoint))
            .unwrap_or(0.0)
            .clamp(0.0, f64::from(MAX_AGE_YEARS));

        let days_since_admission = self
            .days_since_admission
            .or(self.time_in_hospital)
            .unwrap_or(0.0)
            .clamp(0.0, MAX_DAYS_SINCE_ADMISSION as f64);

        let past_history_count = self.past_history_count.unwrap_or_else(|| {
            [
                self.number_inpatient,
                self.number_outpatient,
                self.number_emergency,
            ]
            .iter()
            .flatten()
            .sum()
        });

        let parts = FeatureParts {
            age_years,
            days_since_admission,
            medication_count: self.medication_count.or(self.num_medications).unwrap_or(0.0),
            current_prescription_count: self.current_prescription_count.unwrap_or(0.0),
            allergy_count: self.allergy_count.unwrap_or(0.0),
            high_risk_allergy_count: self.high_risk_allergy_count.unwrap_or(0.0),
            history_count: self.history_count.or(self.number_diagnoses).unwrap_or(0.0),
            high_risk_history_count: self.high_risk_history_count.unwrap_or(0.0),
            past_history_count,
            high_risk_prescription_count: self.high_risk_prescription_count.unwrap_or(0.0),
            gender: self.gender.as_deref().map(parse_gender).unwrap_or_default(),
        };

        let status = self
            .status
            .as_deref()
            .map(PatientStatus::parse)
            .unwrap_or_default();

        FeatureVector::new(parts, status)
    }
}

/// Accepts gender labels as well as the numeric codes written by [`Gender::code`].
fn parse_gender(raw: &str) -> Gender {
    match raw.trim() {
        "0" => Gender::Female,
        "1" => Gender::Male,
        "2" => Gender::Other,
        other => Gender::parse(other),
    }
}

/// Midpoint of an age bracket such as `[40-50)`. Plain numbers are taken as-is.
pub fn age_bracket_midpoint(raw: &str) -> f64 {
    let raw = raw.trim();
    if let Ok(age) = raw.parse::<f64>() {
        if age.is_finite() {
            return age;
        }
    }

    let inner = raw.trim_matches(|c| matches!(c, '[' | ']' | '(' | ')'));
    inner
        .split_once('-')
        .and_then(|(lo, hi)| Some((lo.trim().parse::<f64>().ok()?, hi.trim().parse::<f64>().ok()?)))
        .map(|(lo, hi)| (lo + hi) / 2.0)
        .unwrap_or(DEFAULT_AGE_BRACKET_MIDPOINT)
}

/// Feature vectors and labels, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    pub samples: Vec<FeatureVector>,
    pub labels: Vec<bool>,
    /// Rows dropped for having no usable label or an unreadable record.
    pub skipped: usize,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Keeps only the rows at `indices`, which must be ascending.
    pub fn select(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            skipped: self.skipped,
        }
    }
}

/// Reads a labeled dataset from a CSV file with a header row.
pub fn load_dataset(path: &Path) -> TrainingResult<LabeledDataset> {
    if !path.is_file() {
        return Err(TrainingError::DatasetNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut dataset = LabeledDataset::default();
    for (line, result) in reader.deserialize::<DatasetRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                tracing::debug!("skipping dataset row {}: {}", line + 2, e);
                dataset.skipped += 1;
                continue;
            }
        };

        match row.label() {
            Some(label) => {
                dataset.samples.push(row.features());
                dataset.labels.push(label);
            }
            None => dataset.skipped += 1,
        }
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_native_columns() {
        let temp = TempDir::new().unwrap();
        let path = write_csv(
            &temp,
            "native.csv",
            "age_years,days_since_admission,medication_count,high_risk_prescription_count,gender,label,notes\n\
             72,4,3,2,female,1,x\n\
             30,1,0,0,male,0,y\n",
        );

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels, vec![true, false]);
        assert_eq!(dataset.samples[0].get("age_years"), Some(72.0));
        assert_eq!(dataset.samples[0].get("high_risk_prescription_count"), Some(2.0));
        assert_eq!(dataset.samples[1].gender(), Gender::Male);
        assert_eq!(dataset.samples[1].get("allergy_count"), Some(0.0));
    }

    #[test]
    fn test_uci_columns() {
        let temp = TempDir::new().unwrap();
        let path = write_csv(
            &temp,
            "diabetic_data.csv",
            "encounter_id,gender,age,time_in_hospital,num_medications,number_outpatient,number_emergency,number_inpatient,number_diagnoses,readmitted\n\
             1,Female,[70-80),5,18,0,1,2,9,<30\n\
             2,Male,[40-50),2,11,?,0,0,5,NO\n\
             3,Unknown/Invalid,?,45,7,0,0,0,3,>30\n",
        );

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.labels, vec![true, false, false]);
        assert_eq!(dataset.positives(), 1);

        let first = &dataset.samples[0];
        assert_eq!(first.get("age_years"), Some(75.0));
        assert_eq!(first.get("days_since_admission"), Some(5.0));
        assert_eq!(first.get("medication_count"), Some(18.0));
        assert_eq!(first.get("history_count"), Some(9.0));
        assert_eq!(first.get("past_history_count"), Some(3.0));

        assert_eq!(dataset.samples[1].get("past_history_count"), Some(0.0));
        assert_eq!(dataset.samples[2].get("age_years"), Some(45.0));
        assert_eq!(dataset.samples[2].get("days_since_admission"), Some(30.0));
        assert_eq!(dataset.samples[2].gender(), Gender::Other);
    }

    #[test]
    fn test_rows_without_label_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = write_csv(
            &temp,
            "partial.csv",
            "age_years,label\n60,yes\n61,\n62,maybe\n63,no\n",
        );

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.labels, vec![true, false]);
        assert_eq!(dataset.skipped, 2);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let result = load_dataset(&temp.path().join("missing.csv"));
        assert!(matches!(result, Err(TrainingError::DatasetNotFound(_))));
    }

    #[test]
    fn test_age_bracket_midpoint() {
        assert_eq!(age_bracket_midpoint("[40-50)"), 45.0);
        assert_eq!(age_bracket_midpoint("[90-100)"), 95.0);
        assert_eq!(age_bracket_midpoint("67"), 67.0);
        assert_eq!(age_bracket_midpoint("?"), 45.0);
    }

    #[test]
    fn test_select_keeps_order() {
        let temp = TempDir::new().unwrap();
        let path = write_csv(&temp, "rows.csv", "age_years,label\n10,1\n20,0\n30,1\n");
        let dataset = load_dataset(&path).unwrap();

        let subset = dataset.select(&[0, 2]);
        assert_eq!(subset.labels, vec![true, true]);
        assert_eq!(subset.samples[1].get("age_years"), Some(30.0));
    }
}
