//! Trained model artifacts.
//!
//! One artifact is written per training run and never modified afterwards:
//!
//! ```text
//! <artifact_dir>/
//! ├── risk_model_risk-v1-20260111T143522.045Z.json       # parameters + embedded metadata
//! └── risk_model_risk-v1-20260111T143522.045Z.meta.yaml  # human-readable summary
//! ```
//!
//! The JSON file is the authoritative record; the YAML sidecar is for operators.

use crate::classifier::LogisticModel;
use crate::constants::{
    ARTIFACT_EXTENSION, ARTIFACT_FILE_PREFIX, ARTIFACT_FORMAT_VERSION, METADATA_SIDECAR_SUFFIX,
};
use crate::error::{ArtifactLoadError, InferenceError, TrainingError, TrainingResult};
use crate::features::{feature_order, FeatureVector};
use crate::version::ModelVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Classifier parameters. Tagged so other model families can be added without touching callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression(LogisticModel),
}

impl Classifier {
    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        match self {
            Classifier::LogisticRegression(model) => model.predict_probability(features),
        }
    }

    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, InferenceError> {
        match self {
            Classifier::LogisticRegression(model) => model.predict_batch(batch),
        }
    }

    pub fn contributions(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<(String, f64)>, InferenceError> {
        match self {
            Classifier::LogisticRegression(model) => model.contributions(features),
        }
    }
}

/// What the training run saw and how the model evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// File name of the dataset, without its directory.
    pub dataset: Option<String>,
    pub rows: usize,
    pub positives: usize,
    pub base_rate: f64,
    pub seed: u64,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub version: ModelVersion,
    pub created_at: DateTime<Utc>,
    pub feature_order: Vec<String>,
    pub classifier: Classifier,
    pub training: TrainingMetadata,
}

impl ModelArtifact {
    pub fn new(version: ModelVersion, classifier: Classifier, training: TrainingMetadata) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: version.created_at(),
            version,
            feature_order: feature_order(),
            classifier,
            training,
        }
    }

    /// Reads and decodes an artifact file.
    pub fn read(path: &Path) -> Result<Self, ArtifactLoadError> {
        let load_error = |reason: String| ArtifactLoadError {
            path: path.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&contents).map_err(|e| load_error(e.to_string()))?;

        if artifact.format_version > ARTIFACT_FORMAT_VERSION {
            return Err(load_error(format!(
                "unsupported artifact format {} (newest supported is {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        Ok(artifact)
    }

    /// Writes this artifact and its metadata sidecar into `dir`.
    ///
    /// The JSON is staged under a temporary name and renamed into place last, so readers never
    /// see a partial artifact and a published artifact always has its sidecar. Fails rather than
    /// overwriting an existing artifact.
    pub fn write_new(&self, dir: &Path) -> TrainingResult<PathBuf> {
        fs::create_dir_all(dir).map_err(TrainingError::ArtifactDirCreation)?;

        let final_path = dir.join(artifact_file_name(&self.version));
        if final_path.exists() {
            return Err(TrainingError::ArtifactExists(final_path));
        }

        let json = serde_json::to_string_pretty(self).map_err(TrainingError::Serialization)?;
        let yaml = serde_yaml::to_string(&ArtifactSummary::from(self))
            .map_err(TrainingError::MetadataSerialization)?;

        let staging_path = dir.join(format!(".{}.tmp", artifact_file_name(&self.version)));
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&staging_path)
                .map_err(TrainingError::ArtifactWrite)?;
            if let Err(e) = file.write_all(json.as_bytes()).and_then(|_| file.sync_all()) {
                let _ = fs::remove_file(&staging_path);
                return Err(TrainingError::ArtifactWrite(e));
            }
        }

        let sidecar_path = dir.join(sidecar_file_name(&self.version));
        if let Err(e) = fs::write(&sidecar_path, yaml) {
            let _ = fs::remove_file(&staging_path);
            return Err(TrainingError::ArtifactWrite(e));
        }

        let published = if final_path.exists() {
            Err(TrainingError::ArtifactExists(final_path.clone()))
        } else {
            fs::rename(&staging_path, &final_path).map_err(TrainingError::ArtifactWrite)
        };
        if let Err(e) = published {
            let _ = fs::remove_file(&staging_path);
            return Err(e);
        }

        Ok(final_path)
    }
}

/// Sidecar contents: everything but the classifier parameters.
#[derive(Debug, Serialize)]
struct ArtifactSummary<'a> {
    version: &'a ModelVersion,
    created_at: DateTime<Utc>,
    feature_order: &'a [String],
    classifier: &'static str,
    training: &'a TrainingMetadata,
}

impl<'a> From<&'a ModelArtifact> for ArtifactSummary<'a> {
    fn from(artifact: &'a ModelArtifact) -> Self {
        Self {
            version: &artifact.version,
            created_at: artifact.created_at,
            feature_order: &artifact.feature_order,
            classifier: match artifact.classifier {
                Classifier::LogisticRegression(_) => "logistic_regression",
            },
            training: &artifact.training,
        }
    }
}

/// `risk_model_<version>.json`
pub fn artifact_file_name(version: &ModelVersion) -> String {
    format!("{ARTIFACT_FILE_PREFIX}{version}.{ARTIFACT_EXTENSION}")
}

/// `risk_model_<version>.meta.yaml`
pub fn sidecar_file_name(version: &ModelVersion) -> String {
    format!("{ARTIFACT_FILE_PREFIX}{version}{METADATA_SIDECAR_SUFFIX}")
}

/// Extracts the version from an artifact file name, if it is one for `version_prefix`.
pub fn parse_artifact_file_name(file_name: &str, version_prefix: &str) -> Option<ModelVersion> {
    let stem = file_name
        .strip_prefix(ARTIFACT_FILE_PREFIX)?
        .strip_suffix(ARTIFACT_EXTENSION)?
        .strip_suffix('.')?;
    let version: ModelVersion = stem.parse().ok()?;
    version.matches_prefix(version_prefix).then_some(version)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::FitOptions;
    use crate::features::{FeatureParts, PatientStatus};
    use tempfile::TempDir;

    pub(crate) fn tiny_artifact(version: &str) -> ModelArtifact {
        let samples: Vec<FeatureVector> = (0..6)
            .map(|i| {
                FeatureVector::new(
                    FeatureParts {
                        age_years: 40.0 + i as f64 * 5.0,
                        ..Default::default()
                    },
                    PatientStatus::Unknown,
                )
            })
            .collect();
        let labels = [false, false, false, true, true, true];
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());
        ModelArtifact::new(
            version.parse().unwrap(),
            Classifier::LogisticRegression(model),
            TrainingMetadata {
                dataset: Some("tiny.csv".into()),
                rows: 6,
                positives: 3,
                base_rate: 0.5,
                seed: 42,
                metrics: BTreeMap::new(),
            },
        )
    }

    #[test]
    fn test_write_then_read_preserves_artifact() {
        let temp = TempDir::new().unwrap();
        let artifact = tiny_artifact("risk-v1-20260101T000000.000Z");

        let path = artifact.write_new(temp.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "risk_model_risk-v1-20260101T000000.000Z.json"
        );
        assert!(temp
            .path()
            .join("risk_model_risk-v1-20260101T000000.000Z.meta.yaml")
            .is_file());

        let loaded = ModelArtifact::read(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_write_new_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let artifact = tiny_artifact("risk-v1-20260101T000000.000Z");
        artifact.write_new(temp.path()).unwrap();

        let again = artifact.write_new(temp.path());
        assert!(matches!(again, Err(TrainingError::ArtifactExists(_))));
    }

    #[test]
    fn test_failed_sidecar_write_publishes_nothing() {
        let temp = TempDir::new().unwrap();
        let artifact = tiny_artifact("risk-v1-20260101T000000.000Z");
        // A directory in the sidecar's place makes the sidecar write fail.
        fs::create_dir(temp.path().join(sidecar_file_name(&artifact.version))).unwrap();

        let result = artifact.write_new(temp.path());
        assert!(matches!(result, Err(TrainingError::ArtifactWrite(_))));
        let files: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".json") || name.ends_with(".tmp"))
            .collect();
        assert!(files.is_empty(), "{files:?}");
    }

    #[test]
    fn test_read_corrupt_file_is_load_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("risk_model_risk-v1-20260101T000000.000Z.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ModelArtifact::read(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_parse_artifact_file_name() {
        let parsed =
            parse_artifact_file_name("risk_model_risk-v1-20260101T000000.000Z.json", "risk-v1");
        assert_eq!(
            parsed.map(|v| v.to_string()).as_deref(),
            Some("risk-v1-20260101T000000.000Z")
        );

        assert!(parse_artifact_file_name(
            "risk_model_risk-v1-20260101T000000.000Z.meta.yaml",
            "risk-v1"
        )
        .is_none());
        assert!(parse_artifact_file_name(
            "risk_model_risk-v2-20260101T000000.000Z.json",
            "risk-v1"
        )
        .is_none());
        assert!(parse_artifact_file_name("risk_model_garbage.json", "risk-v1").is_none());
        assert!(parse_artifact_file_name("notes.json", "risk-v1").is_none());
    }
}
