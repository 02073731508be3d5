//! High-risk vocabulary used to count the risk-relevant subset of clinical lists.
//!
//! Which names count as high-risk is clinical policy rather than algorithm, so the lists can be
//! supplied as a YAML file:
//!
//! ```yaml
//! allergies: [penicillin, latex]
//! medications: [warfarin, insulin]
//! conditions: [heart failure, copd]
//! ```
//!
//! Any list missing from the file falls back to the built-in defaults.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_HIGH_RISK_ALLERGIES: &[&str] = &[
    "penicillin",
    "sulfa",
    "latex",
    "peanut",
    "shellfish",
    "contrast",
    "anaphylaxis",
    "aspirin",
    "nsaid",
];

const DEFAULT_HIGH_RISK_MEDICATIONS: &[&str] = &[
    "warfarin",
    "heparin",
    "enoxaparin",
    "apixaban",
    "rivaroxaban",
    "insulin",
    "digoxin",
    "amiodarone",
    "morphine",
    "fentanyl",
    "oxycodone",
    "hydromorphone",
    "methotrexate",
    "lithium",
    "chemotherapy",
];

const DEFAULT_HIGH_RISK_CONDITIONS: &[&str] = &[
    "heart failure",
    "copd",
    "chronic kidney disease",
    "ckd",
    "dialysis",
    "myocardial infarction",
    "stroke",
    "sepsis",
    "cancer",
    "cirrhosis",
    "diabetes",
];

/// Term lists matched case-insensitively against clinical entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighRiskVocabulary {
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub conditions: Vec<String>,
}

impl Default for HighRiskVocabulary {
    fn default() -> Self {
        fn owned(terms: &[&str]) -> Vec<String> {
            terms.iter().map(|t| t.to_string()).collect()
        }

        Self {
            allergies: owned(DEFAULT_HIGH_RISK_ALLERGIES),
            medications: owned(DEFAULT_HIGH_RISK_MEDICATIONS),
            conditions: owned(DEFAULT_HIGH_RISK_CONDITIONS),
        }
    }
}

impl HighRiskVocabulary {
    /// Parses a vocabulary from YAML text. Terms are trimmed and lower-cased; blanks dropped.
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let parsed: Self = serde_yaml::from_str(text).map_err(ConfigError::VocabularyParse)?;
        Ok(parsed.normalised())
    }

    /// Loads a vocabulary file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::VocabularyRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn is_high_risk_allergy(&self, entry: &str) -> bool {
        matches_any(&self.allergies, entry)
    }

    pub fn is_high_risk_medication(&self, entry: &str) -> bool {
        matches_any(&self.medications, entry)
    }

    pub fn is_high_risk_condition(&self, entry: &str) -> bool {
        matches_any(&self.conditions, entry)
    }

    fn normalised(self) -> Self {
        fn clean(terms: Vec<String>) -> Vec<String> {
            terms
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        }

        Self {
            allergies: clean(self.allergies),
            medications: clean(self.medications),
            conditions: clean(self.conditions),
        }
    }
}

fn matches_any(terms: &[String], entry: &str) -> bool {
    let entry = entry.to_lowercase();
    terms.iter().any(|term| entry.contains(term.as_str()))
}
