//! Logistic regression over the shared feature schema.
//!
//! Numeric features are standardised with the training mean and scale; the categorical
//! `gender` feature is expanded into one indicator term per level. Each term records the
//! statistics needed to mean-centre it again at explanation time, so the parameters in the
//! artifact are all an inference implementation needs.

use crate::error::InferenceError;
use crate::features::{feature_kind, FeatureKind, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};

/// How a term's design value is derived from its source feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TermEncoding {
    /// `(x - mean) / scale`
    Standardized { mean: f64, scale: f64 },
    /// `1.0` when the categorical code equals `level`. `frequency` is the training share of
    /// that level.
    Indicator { level: usize, frequency: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTerm {
    /// Display name, `age_years` or `gender=male`.
    pub name: String,
    /// Index into the feature vector.
    pub source: usize,
    pub encoding: TermEncoding,
    pub coefficient: f64,
}

impl ModelTerm {
    fn design_value(&self, x: f64) -> f64 {
        match self.encoding {
            TermEncoding::Standardized { mean, scale } => (x - mean) / scale,
            TermEncoding::Indicator { level, .. } => indicator(x, level),
        }
    }

    fn centred_value(&self, x: f64) -> f64 {
        match self.encoding {
            TermEncoding::Standardized { mean, scale } => (x - mean) / scale,
            TermEncoding::Indicator { level, frequency } => indicator(x, level) - frequency,
        }
    }
}

fn indicator(x: f64, level: usize) -> f64 {
    if x >= 0.0 && x.round() as usize == level {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Number of feature values the model expects.
    pub input_count: usize,
    pub intercept: f64,
    pub terms: Vec<ModelTerm>,
}

/// Gradient descent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub l2_penalty: f64,
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iterations: 500,
            l2_penalty: 1e-3,
            tolerance: 1e-6,
        }
    }
}

impl LogisticModel {
    /// Fits the model with full-batch gradient descent. Deterministic for a given input.
    pub fn fit(samples: &[FeatureVector], labels: &[bool], options: &FitOptions) -> Self {
        let mut terms = build_terms(samples);
        let n = samples.len().min(labels.len());
        if n == 0 {
            return Self {
                input_count: FEATURE_COUNT,
                intercept: 0.0,
                terms,
            };
        }

        let design: Vec<Vec<f64>> = samples[..n]
            .iter()
            .map(|fv| {
                terms
                    .iter()
                    .map(|t| t.design_value(fv.values()[t.source]))
                    .collect()
            })
            .collect();
        let targets: Vec<f64> = labels[..n]
            .iter()
            .map(|&l| if l { 1.0 } else { 0.0 })
            .collect();

        let base_rate = (targets.iter().sum::<f64>() / n as f64).clamp(1e-4, 1.0 - 1e-4);
        let mut intercept = (base_rate / (1.0 - base_rate)).ln();
        let mut weights = vec![0.0; terms.len()];
        let inv_n = 1.0 / n as f64;

        for _ in 0..options.max_iterations {
            let mut grad_w = vec![0.0; weights.len()];
            let mut grad_b = 0.0;

            for (row, y) in design.iter().zip(&targets) {
                let z = intercept + dot(&weights, row);
                let err = sigmoid(z) - y;
                grad_b += err;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
            }

            grad_b *= inv_n;
            let mut max_grad = grad_b.abs();
            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g * inv_n + options.l2_penalty * w;
                max_grad = max_grad.max(g.abs());
            }

            intercept -= options.learning_rate * grad_b;
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= options.learning_rate * g;
            }

            if max_grad < options.tolerance {
                break;
            }
        }

        for (term, w) in terms.iter_mut().zip(weights) {
            term.coefficient = w;
        }

        Self {
            input_count: FEATURE_COUNT,
            intercept,
            terms,
        }
    }

    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let values = self.checked_inputs(features)?;
        let z = self.intercept
            + self
                .terms
                .iter()
                .map(|t| t.coefficient * t.design_value(values[t.source]))
                .sum::<f64>();

        let p = sigmoid(z);
        if p.is_finite() {
            Ok(p)
        } else {
            Err(InferenceError::NonFinite)
        }
    }

    /// Scores several vectors in one call.
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, InferenceError> {
        batch.iter().map(|fv| self.predict_probability(fv)).collect()
    }

    /// Per-term `coefficient * centred value`, in term order.
    pub fn contributions(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<(String, f64)>, InferenceError> {
        let values = self.checked_inputs(features)?;
        Ok(self
            .terms
            .iter()
            .map(|t| (t.name.clone(), t.coefficient * t.centred_value(values[t.source])))
            .collect())
    }

    fn checked_inputs<'a>(&self, features: &'a FeatureVector) -> Result<&'a [f64], InferenceError> {
        let values = features.values();
        let max_source = self.terms.iter().map(|t| t.source + 1).max().unwrap_or(0);
        if values.len() != self.input_count || max_source > values.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.input_count.max(max_source),
                got: values.len(),
            });
        }
        Ok(values)
    }
}

fn build_terms(samples: &[FeatureVector]) -> Vec<ModelTerm> {
    let n = samples.len().max(1) as f64;
    let mut terms = Vec::new();

    for (idx, name) in FEATURE_NAMES.iter().enumerate() {
        match feature_kind(idx) {
            FeatureKind::Numeric => {
                let mean = samples.iter().map(|fv| fv.values()[idx]).sum::<f64>() / n;
                let variance = samples
                    .iter()
                    .map(|fv| (fv.values()[idx] - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();
                terms.push(ModelTerm {
                    name: name.to_string(),
                    source: idx,
                    encoding: TermEncoding::Standardized {
                        mean,
                        scale: if std > 1e-12 { std } else { 1.0 },
                    },
                    coefficient: 0.0,
                });
            }
            FeatureKind::Categorical(levels) => {
                for (level, label) in levels.iter().enumerate() {
                    let count = samples
                        .iter()
                        .filter(|fv| indicator(fv.values()[idx], level) > 0.0)
                        .count();
                    terms.push(ModelTerm {
                        name: format!("{name}={label}"),
                        source: idx,
                        encoding: TermEncoding::Indicator {
                            level,
                            frequency: count as f64 / n,
                        },
                        coefficient: 0.0,
                    });
                }
            }
        }
    }

    terms
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureParts, Gender, PatientStatus};

    fn vector(age: f64, high_risk_meds: f64, gender: Gender) -> FeatureVector {
        FeatureVector::new(
            FeatureParts {
                age_years: age,
                high_risk_prescription_count: high_risk_meds,
                medication_count: high_risk_meds + 1.0,
                gender,
                ..Default::default()
            },
            PatientStatus::Unknown,
        )
    }

    fn separable_sample() -> (Vec<FeatureVector>, Vec<bool>) {
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let risky = i % 2 == 0;
            let age = if risky { 70.0 + (i % 7) as f64 } else { 30.0 + (i % 9) as f64 };
            let meds = if risky { 2.0 } else { 0.0 };
            let gender = if i % 3 == 0 { Gender::Male } else { Gender::Female };
            samples.push(vector(age, meds, gender));
            labels.push(risky);
        }
        (samples, labels)
    }

    #[test]
    fn test_fit_separates_risky_rows() {
        let (samples, labels) = separable_sample();
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());

        let high = model.predict_probability(&vector(75.0, 2.0, Gender::Male)).unwrap();
        let low = model.predict_probability(&vector(32.0, 0.0, Gender::Female)).unwrap();
        assert!(high > 0.5, "high={high}");
        assert!(low < 0.5, "low={low}");
        assert!(high > low);
    }

    #[test]
    fn test_fit_has_one_term_per_numeric_feature_and_gender_level() {
        let (samples, labels) = separable_sample();
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());
        assert_eq!(model.terms.len(), FEATURE_COUNT - 1 + 3);
        assert!(model.terms.iter().any(|t| t.name == "gender=male"));
    }

    #[test]
    fn test_constant_feature_does_not_produce_nan() {
        let samples = vec![vector(50.0, 0.0, Gender::Other); 6];
        let labels = vec![true, false, false, true, false, false];
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());
        let p = model.predict_probability(&samples[0]).unwrap();
        assert!(p.is_finite());
        assert!((p - 1.0 / 3.0).abs() < 0.05, "p={p}");
    }

    #[test]
    fn test_contributions_are_mean_centred() {
        let (samples, labels) = separable_sample();
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());

        let mean_age = samples.iter().map(|fv| fv.values()[0]).sum::<f64>() / samples.len() as f64;
        let at_mean = vector(mean_age, 1.0, Gender::Male);
        let contributions = model.contributions(&at_mean).unwrap();
        let age = contributions.iter().find(|(n, _)| n == "age_years").unwrap();
        assert!(age.1.abs() < 1e-9);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let (samples, labels) = separable_sample();
        let mut model = LogisticModel::fit(&samples, &labels, &FitOptions::default());
        model.input_count = FEATURE_COUNT + 2;

        let err = model.predict_probability(&samples[0]).unwrap_err();
        assert_eq!(
            err,
            InferenceError::ShapeMismatch {
                expected: FEATURE_COUNT + 2,
                got: FEATURE_COUNT
            }
        );
    }

    #[test]
    fn test_predict_batch_matches_single() {
        let (samples, labels) = separable_sample();
        let model = LogisticModel::fit(&samples, &labels, &FitOptions::default());
        let batch = model.predict_batch(&samples[..4]).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[1], model.predict_probability(&samples[1]).unwrap());
    }
}
