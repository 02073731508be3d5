//! Ranked contributing factors for a score.

use crate::artifact::ModelArtifact;
use crate::error::InferenceError;
use crate::features::FeatureVector;
use crate::heuristic::{base_probability, HeuristicScore};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Contributions smaller than this are noise and left out.
const MIN_CONTRIBUTION: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    fn of(contribution: f64) -> Self {
        if contribution < 0.0 {
            Direction::Negative
        } else {
            Direction::Positive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub feature: String,
    pub direction: Direction,
    pub contribution: f64,
}

impl FactorContribution {
    fn new(feature: impl Into<String>, contribution: f64) -> Self {
        Self {
            feature: feature.into(),
            direction: Direction::of(contribution),
            contribution: round4(contribution),
        }
    }
}

/// Top `top_n` terms of a trained model for `features`, by absolute contribution.
///
/// Linear terms contribute `coefficient * centred value`, so a patient at the training mean
/// contributes nothing on that feature.
pub fn explain_model(
    features: &FeatureVector,
    artifact: &ModelArtifact,
    top_n: usize,
) -> Result<Vec<FactorContribution>, InferenceError> {
    let contributions = artifact.classifier.contributions(features)?;
    Ok(rank(contributions, top_n).unwrap_or_else(|| {
        vec![FactorContribution::new("model_intercept", 0.0)]
    }))
}

/// Top `top_n` fired heuristic rules.
pub fn explain_heuristic(score: &HeuristicScore, top_n: usize) -> Vec<FactorContribution> {
    let contributions = score
        .terms
        .iter()
        .map(|term| (term.feature.to_string(), term.contribution));
    rank(contributions, top_n)
        .unwrap_or_else(|| vec![FactorContribution::new("baseline_risk", base_probability())])
}

/// Sorts by descending magnitude and keeps the first `top_n`. `None` if nothing is left.
fn rank(
    contributions: impl IntoIterator<Item = (String, f64)>,
    top_n: usize,
) -> Option<Vec<FactorContribution>> {
    let mut kept: Vec<(String, f64)> = contributions
        .into_iter()
        .filter(|(_, c)| c.is_finite() && c.abs() >= MIN_CONTRIBUTION)
        .collect();
    kept.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));
    kept.truncate(top_n);

    if kept.is_empty() {
        return None;
    }
    Some(
        kept.into_iter()
            .map(|(feature, c)| FactorContribution::new(feature, c))
            .collect(),
    )
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::tests::tiny_artifact;
    use crate::features::{FeatureParts, PatientStatus};
    use crate::heuristic::heuristic_score;

    fn patient(age: f64) -> FeatureVector {
        FeatureVector::new(
            FeatureParts {
                age_years: age,
                high_risk_prescription_count: 2.0,
                high_risk_allergy_count: 1.0,
                medication_count: 3.0,
                ..Default::default()
            },
            PatientStatus::Active,
        )
    }

    #[test]
    fn test_heuristic_explanation_is_sorted_and_truncated() {
        let score = heuristic_score(&patient(80.0));
        let factors = explain_heuristic(&score, 2);

        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].feature, "high_risk_prescription_count");
        assert_eq!(factors[0].contribution, 0.14);
        assert_eq!(factors[1].feature, "age_years>=75");
        assert!(factors[0].contribution.abs() >= factors[1].contribution.abs());
    }

    #[test]
    fn test_negative_rule_direction() {
        let score = heuristic_score(&FeatureVector::new(
            FeatureParts::default(),
            PatientStatus::Unknown,
        ));
        let factors = explain_heuristic(&score, 5);
        assert_eq!(factors[0].direction, Direction::Negative);
        assert_eq!(factors[0].contribution, -0.04);
    }

    #[test]
    fn test_heuristic_without_rules_reports_baseline() {
        let score = HeuristicScore {
            probability: base_probability(),
            terms: Vec::new(),
        };
        let factors = explain_heuristic(&score, 5);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].feature, "baseline_risk");
        assert_eq!(factors[0].direction, Direction::Positive);
    }

    #[test]
    fn test_model_explanation_ranked_by_magnitude() {
        let artifact = tiny_artifact("risk-v1-20260101T000000.000Z");
        let factors = explain_model(&patient(75.0), &artifact, 3).unwrap();

        assert!(!factors.is_empty() && factors.len() <= 3);
        assert!(factors
            .windows(2)
            .all(|w| w[0].contribution.abs() >= w[1].contribution.abs()));
        assert_eq!(factors[0].feature, "age_years");
        assert_eq!(factors[0].direction, Direction::Positive);
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        let json = serde_json::to_string(&FactorContribution::new("gender=male", -0.5)).unwrap();
        assert_eq!(
            json,
            r#"{"feature":"gender=male","direction":"negative","contribution":-0.5}"#
        );
    }
}
