//! Rule-based fallback scorer.
//!
//! Used whenever no trained model can score a record. Starts from a fixed base rate and adds a
//! weighted term per rule that fires; the result is bounded to `[MIN_PROBABILITY,
//! MAX_PROBABILITY]`. The fired terms double as the explanation.

use crate::features::{FeatureVector, PatientStatus};

const BASE_PROBABILITY: f64 = 0.08;
const MIN_PROBABILITY: f64 = 0.01;
const MAX_PROBABILITY: f64 = 0.95;

/// A rule that fired, labelled by its condition, and what it added to the probability.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTerm {
    pub feature: &'static str,
    pub contribution: f64,
}

/// Heuristic probability and the rule terms that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScore {
    pub probability: f64,
    pub terms: Vec<RuleTerm>,
}

pub fn heuristic_score(features: &FeatureVector) -> HeuristicScore {
    let value = |name: &str| features.get(name).unwrap_or(0.0);
    let mut terms = Vec::new();
    let mut add = |feature: &'static str, contribution: f64| {
        terms.push(RuleTerm {
            feature,
            contribution,
        })
    };

    if features.status() == PatientStatus::Critical {
        add("status=critical", 0.20);
    }

    if value("days_since_admission") >= 14.0 {
        add("days_since_admission>=14", 0.10);
    }

    let age = value("age_years");
    if age >= 75.0 {
        add("age_years>=75", 0.12);
    } else if age >= 65.0 {
        add("age_years>=65", 0.08);
    }

    let high_risk_prescriptions = value("high_risk_prescription_count").min(3.0);
    if high_risk_prescriptions > 0.0 {
        add("high_risk_prescription_count", 0.07 * high_risk_prescriptions);
    }

    let high_risk_allergies = value("high_risk_allergy_count").min(2.0);
    if high_risk_allergies > 0.0 {
        add("high_risk_allergy_count", 0.05 * high_risk_allergies);
    }

    let high_risk_history = value("high_risk_history_count").min(3.0);
    if high_risk_history > 0.0 {
        add("high_risk_history_count", 0.06 * high_risk_history);
    }

    if value("history_count") >= 4.0 {
        add("history_count>=4", 0.06);
    }

    if value("past_history_count") >= 2.0 {
        add("past_history_count>=2", 0.04);
    }

    if value("medication_count") == 0.0 && value("current_prescription_count") == 0.0 {
        add("medication_count=0", -0.04);
    }

    let raw = BASE_PROBABILITY + terms.iter().map(|t| t.contribution).sum::<f64>();
    HeuristicScore {
        probability: raw.clamp(MIN_PROBABILITY, MAX_PROBABILITY),
        terms,
    }
}

/// Probability before any rule fires.
pub fn base_probability() -> f64 {
    BASE_PROBABILITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureParts;

    fn vector(parts: FeatureParts, status: PatientStatus) -> FeatureVector {
        FeatureVector::new(parts, status)
    }

    #[test]
    fn test_empty_record_scores_near_base() {
        let score = heuristic_score(&vector(FeatureParts::default(), PatientStatus::Unknown));
        // Only the "no medications" rule fires.
        assert!((score.probability - 0.04).abs() < 1e-12);
        assert_eq!(score.terms.len(), 1);
        assert_eq!(score.terms[0].feature, "medication_count=0");
    }

    #[test]
    fn test_rules_accumulate_with_caps() {
        let parts = FeatureParts {
            age_years: 80.0,
            days_since_admission: 20.0,
            medication_count: 6.0,
            high_risk_prescription_count: 5.0,
            high_risk_allergy_count: 4.0,
            high_risk_history_count: 1.0,
            history_count: 5.0,
            past_history_count: 3.0,
            ..Default::default()
        };
        let score = heuristic_score(&vector(parts, PatientStatus::Active));
        // 0.08 + 0.10 + 0.12 + 0.21 + 0.10 + 0.06 + 0.06 + 0.04
        assert!((score.probability - 0.77).abs() < 1e-9, "{}", score.probability);
    }

    #[test]
    fn test_probability_is_bounded() {
        let parts = FeatureParts {
            age_years: 90.0,
            days_since_admission: 30.0,
            medication_count: 9.0,
            high_risk_prescription_count: 9.0,
            high_risk_allergy_count: 9.0,
            high_risk_history_count: 9.0,
            history_count: 9.0,
            past_history_count: 9.0,
            ..Default::default()
        };
        let score = heuristic_score(&vector(parts, PatientStatus::Critical));
        assert_eq!(score.probability, 0.95);
    }

    #[test]
    fn test_critical_status_raises_score() {
        let parts = FeatureParts {
            medication_count: 1.0,
            ..Default::default()
        };
        let calm = heuristic_score(&vector(parts, PatientStatus::Active));
        let critical = heuristic_score(&vector(parts, PatientStatus::Critical));
        assert!((critical.probability - calm.probability - 0.20).abs() < 1e-12);
        assert_eq!(calm.probability, base_probability());
    }
}
