//! Scoring service: feature extraction, supervised prediction with heuristic fallback, and the
//! mapping from probability to band, seriousness and recommendation.
//!
//! Scoring never fails. Anything that stops the trained model from producing a probability (no
//! artifact, an unreadable artifact, a schema mismatch, an inference error) is captured in
//! [`ScoringOutcome::Heuristic`] and the rule-based score is reported instead.

use crate::artifact::ModelArtifact;
use crate::config::ScoringConfig;
use crate::constants::{
    HEURISTIC_MODEL_VERSION, RISK_BAND_HIGH_THRESHOLD, RISK_BAND_MEDIUM_THRESHOLD,
    SERIOUSNESS_CRITICAL_THRESHOLD, SERIOUSNESS_HIGH_THRESHOLD, SERIOUSNESS_MODERATE_THRESHOLD,
};
use crate::error::{RegistryResult, SchemaMismatchError, ScoringError};
use crate::explain::{explain_heuristic, explain_model, Direction, FactorContribution};
use crate::features::{feature_order, FeatureExtractor, FeatureVector};
use crate::heuristic::heuristic_score;
use crate::patient::PatientRecord;
use crate::registry::{Freshness, ModelRegistry};
use crate::version::ModelVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriousnessLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl SeriousnessLevel {
    fn recommendation(self) -> &'static str {
        match self {
            SeriousnessLevel::Low => {
                "Continue routine monitoring and reassess if the clinical picture changes."
            }
            SeriousnessLevel::Moderate => {
                "Increase observation frequency and review the care plan within 24 hours."
            }
            SeriousnessLevel::High => {
                "Arrange prompt clinician review and consider escalating the level of care."
            }
            SeriousnessLevel::Critical => {
                "Request immediate senior clinical review and escalate care now."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    Supervised,
    Heuristic,
}

/// Response contract consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoreResult {
    pub risk_probability: f64,
    pub risk_band: RiskBand,
    pub model_version: String,
    pub scoring_mode: ScoringMode,
    pub top_factors: Vec<FactorContribution>,
    pub seriousness_factor: f64,
    pub seriousness_level: SeriousnessLevel,
    pub assessment_recommendation: String,
}

/// How a score was produced.
#[derive(Debug)]
pub enum ScoringOutcome {
    Supervised {
        version: ModelVersion,
        probability: f64,
        factors: Vec<FactorContribution>,
    },
    Heuristic {
        reason: ScoringError,
        probability: f64,
        factors: Vec<FactorContribution>,
    },
}

impl ScoringOutcome {
    pub fn probability(&self) -> f64 {
        match self {
            ScoringOutcome::Supervised { probability, .. }
            | ScoringOutcome::Heuristic { probability, .. } => *probability,
        }
    }

    pub fn factors(&self) -> &[FactorContribution] {
        match self {
            ScoringOutcome::Supervised { factors, .. }
            | ScoringOutcome::Heuristic { factors, .. } => factors,
        }
    }

    pub fn mode(&self) -> ScoringMode {
        match self {
            ScoringOutcome::Supervised { .. } => ScoringMode::Supervised,
            ScoringOutcome::Heuristic { .. } => ScoringMode::Heuristic,
        }
    }

    pub fn model_version(&self) -> String {
        match self {
            ScoringOutcome::Supervised { version, .. } => version.to_string(),
            ScoringOutcome::Heuristic { .. } => HEURISTIC_MODEL_VERSION.to_string(),
        }
    }

    /// Maps the outcome onto the response contract.
    pub fn into_result(self) -> RiskScoreResult {
        let probability = self.probability();
        let seriousness_factor = seriousness_factor(probability);
        let seriousness_level = seriousness_level(seriousness_factor);
        let assessment_recommendation = recommendation(seriousness_level, self.factors());

        RiskScoreResult {
            risk_probability: probability,
            risk_band: risk_band(probability),
            model_version: self.model_version(),
            scoring_mode: self.mode(),
            seriousness_factor,
            seriousness_level,
            assessment_recommendation,
            top_factors: match self {
                ScoringOutcome::Supervised { factors, .. }
                | ScoringOutcome::Heuristic { factors, .. } => factors,
            },
        }
    }
}

/// Diagnostic view of the registry state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveModel {
    pub active_version: Option<String>,
    pub last_load_error: Option<String>,
    pub artifact_dir: PathBuf,
}

/// Scores patient records. `Send + Sync`; share one instance behind an `Arc`.
#[derive(Debug)]
pub struct ScoringService {
    config: ScoringConfig,
    extractor: FeatureExtractor,
    registry: ModelRegistry,
}

impl ScoringService {
    pub fn new(config: ScoringConfig) -> Self {
        Self::with_registry(config, ModelRegistry::new())
    }

    pub fn with_registry(config: ScoringConfig, registry: ModelRegistry) -> Self {
        let extractor = FeatureExtractor::new(config.vocabulary().clone());
        Self {
            config,
            extractor,
            registry,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Scores `record` as of now.
    pub fn score(&self, record: &PatientRecord) -> RiskScoreResult {
        self.score_at(record, Utc::now())
    }

    /// Scores `record` with ages and lengths of stay measured at `now`.
    pub fn score_at(&self, record: &PatientRecord, now: DateTime<Utc>) -> RiskScoreResult {
        self.assess_at(record, now).into_result()
    }

    pub fn assess(&self, record: &PatientRecord) -> ScoringOutcome {
        self.assess_at(record, Utc::now())
    }

    /// Runs the trained model if possible, otherwise the heuristic, and says which.
    pub fn assess_at(&self, record: &PatientRecord, now: DateTime<Utc>) -> ScoringOutcome {
        let features = self.extractor.extract(record, now);

        match self.score_supervised(&features) {
            Ok(outcome) => outcome,
            Err(reason) => {
                match &reason {
                    ScoringError::NoArtifact => {
                        tracing::debug!("no trained model available, using heuristic scoring")
                    }
                    other => tracing::warn!("falling back to heuristic scoring: {}", other),
                }
                self.score_heuristic(&features, reason)
            }
        }
    }

    /// Re-reads the newest artifact from disk even if one is cached.
    pub fn refresh(&self) -> RegistryResult<Option<ModelVersion>> {
        let artifact = self.registry.load(
            self.config.artifact_dir(),
            self.config.version_prefix(),
            Freshness::Latest,
        )?;
        Ok(artifact.map(|a| a.version.clone()))
    }

    pub fn active_model(&self) -> ActiveModel {
        let dir = self.config.artifact_dir();
        ActiveModel {
            active_version: self.registry.cached_version(dir).map(|v| v.to_string()),
            last_load_error: self.registry.last_load_error().map(|e| e.to_string()),
            artifact_dir: dir.to_path_buf(),
        }
    }

    fn score_supervised(&self, features: &FeatureVector) -> Result<ScoringOutcome, ScoringError> {
        let artifact = self
            .registry
            .load_latest(self.config.artifact_dir(), self.config.version_prefix())?
            .ok_or(ScoringError::NoArtifact)?;
        check_schema(&artifact)?;

        let probability = artifact.classifier.predict_probability(features)?;
        let factors = explain_model(features, &artifact, self.config.top_factors())?;

        Ok(ScoringOutcome::Supervised {
            version: artifact.version.clone(),
            probability: round_probability(probability),
            factors,
        })
    }

    fn score_heuristic(&self, features: &FeatureVector, reason: ScoringError) -> ScoringOutcome {
        let score = heuristic_score(features);
        ScoringOutcome::Heuristic {
            reason,
            probability: round_probability(score.probability),
            factors: explain_heuristic(&score, self.config.top_factors()),
        }
    }
}

fn check_schema(artifact: &ModelArtifact) -> Result<(), SchemaMismatchError> {
    let expected = feature_order();
    if artifact.feature_order != expected {
        return Err(SchemaMismatchError {
            expected,
            found: artifact.feature_order.clone(),
        });
    }
    Ok(())
}

/// Clamps to `[0, 1]` and rounds to 4 decimals.
fn round_probability(probability: f64) -> f64 {
    if !probability.is_finite() {
        return 0.0;
    }
    (probability.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

pub fn risk_band(probability: f64) -> RiskBand {
    if probability < RISK_BAND_MEDIUM_THRESHOLD {
        RiskBand::Low
    } else if probability < RISK_BAND_HIGH_THRESHOLD {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Probability on a 0-100 scale, one decimal place.
pub fn seriousness_factor(probability: f64) -> f64 {
    (probability * 100.0 * 10.0).round() / 10.0
}

pub fn seriousness_level(factor: f64) -> SeriousnessLevel {
    if factor < SERIOUSNESS_MODERATE_THRESHOLD {
        SeriousnessLevel::Low
    } else if factor < SERIOUSNESS_HIGH_THRESHOLD {
        SeriousnessLevel::Moderate
    } else if factor < SERIOUSNESS_CRITICAL_THRESHOLD {
        SeriousnessLevel::High
    } else {
        SeriousnessLevel::Critical
    }
}

/// Level text, followed by a focused action when a high-risk category drives a serious score.
pub fn recommendation(level: SeriousnessLevel, factors: &[FactorContribution]) -> String {
    let base = level.recommendation();
    if level < SeriousnessLevel::High {
        return base.to_string();
    }

    let focus = factors
        .iter()
        .find(|f| f.direction == Direction::Positive)
        .and_then(|f| match f.feature.as_str() {
            "high_risk_prescription_count" => Some(
                "Review high-risk medications (anticoagulants, insulin, opioids) for dosing and interactions.",
            ),
            "high_risk_allergy_count" => {
                Some("Confirm high-risk allergies are flagged on all orders and the wristband.")
            }
            "high_risk_history_count" => {
                Some("Check management plans for high-risk chronic conditions.")
            }
            _ => None,
        });

    match focus {
        Some(focus) => format!("{base} {focus}"),
        None => base.to_string(),
    }
}
