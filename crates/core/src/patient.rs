//! Patient record as handed over by the storage collaborator.
//!
//! The record is read-only input to scoring. Every field is optional and the clinical lists
//! tolerate whatever shape the upstream store produced, so deserialising a record never fails
//! because of one odd field.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A patient record in the shape scoring consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientRecord {
    /// Date of birth, usually `YYYY-MM-DD`.
    #[serde(alias = "dateOfBirth", deserialize_with = "lenient_text")]
    pub date_of_birth: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    /// Admission state as recorded on the ward (`active`, `discharged`, `critical`).
    #[serde(deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(alias = "admissionDate", deserialize_with = "lenient_text")]
    pub admission_date: Option<String>,
    pub medications: ClinicalList,
    #[serde(alias = "currentPrescriptions")]
    pub current_prescriptions: ClinicalList,
    pub allergies: ClinicalList,
    #[serde(alias = "medicalHistory")]
    pub medical_history: ClinicalList,
    #[serde(alias = "pastMedicalHistory")]
    pub past_medical_history: ClinicalList,
}

/// A normalised list of clinical entries (medications, allergies, history items).
///
/// Accepts a JSON array of strings, an array of objects (their non-empty values joined with a
/// space), or a single delimited string. Any other shape deserialises to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClinicalList(Vec<String>);

impl ClinicalList {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Normalises an arbitrary JSON value into a list of non-empty entries.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::new(text.split([',', ';', '\n'])),
            Value::Array(items) => Self::new(items.iter().filter_map(entry_text)),
            _ => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn entry_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            let parts: Vec<String> = map
                .values()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
            Some(parts.join(" "))
        }
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl<'de> Deserialize<'de> for ClinicalList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ClinicalList::from_value(&value))
    }
}
