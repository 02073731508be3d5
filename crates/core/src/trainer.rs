//! Offline training: labeled CSV in, one new versioned artifact out.
//!
//! A run either writes exactly one new artifact (plus its sidecar) or fails without touching
//! the artifact directory. Threshold failures surface as [`DataInsufficientError`] so callers
//! can report which requirement was not met.

use crate::artifact::{Classifier, ModelArtifact, TrainingMetadata};
use crate::classifier::{FitOptions, LogisticModel};
use crate::constants::{
    DEFAULT_MAX_ROWS, DEFAULT_MIN_POSITIVES, DEFAULT_MIN_ROWS, DEFAULT_TRAINING_SEED,
    MODEL_VERSION_SCHEME,
};
use crate::dataset::{load_dataset, LabeledDataset};
use crate::error::{DataInsufficientError, TrainingError, TrainingResult};
use crate::metrics::{average_precision, brier_score, roc_auc};
use crate::registry::discover;
use crate::version::ModelVersion;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Rows scored in one batch after fitting to check the model produces usable probabilities.
const VALIDATION_BATCH_SIZE: usize = 8;

/// Share of each class held out for evaluation.
const EVALUATION_FRACTION: f64 = 0.2;

// Held-out evaluation only runs when both classes and the dataset are this large.
const EVALUATION_MIN_PER_CLASS: usize = 10;
const EVALUATION_MIN_ROWS: usize = 200;

/// Fewest rows a fit is attempted on, whatever `min_rows` says.
const MIN_TRAINABLE_ROWS: usize = 3;

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub dataset_path: PathBuf,
    pub output_dir: PathBuf,
    pub min_rows: usize,
    pub min_positives: usize,
    /// Upper bound on rows used; `0` disables the cap.
    pub max_rows: usize,
    pub seed: u64,
    /// Accept fewer than `min_positives` positives, as long as there is at least one.
    pub allow_low_positives: bool,
    pub version_scheme: String,
    pub fit: FitOptions,
}

impl TrainingOptions {
    pub fn new(dataset_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            output_dir: output_dir.into(),
            min_rows: DEFAULT_MIN_ROWS,
            min_positives: DEFAULT_MIN_POSITIVES,
            max_rows: DEFAULT_MAX_ROWS,
            seed: DEFAULT_TRAINING_SEED,
            allow_low_positives: false,
            version_scheme: MODEL_VERSION_SCHEME.to_string(),
            fit: FitOptions::default(),
        }
    }

    fn validate(&self) -> TrainingResult<()> {
        if self.version_scheme.trim().is_empty() {
            return Err(TrainingError::InvalidInput(
                "version_scheme must not be empty".into(),
            ));
        }
        if self.max_rows != 0 && self.max_rows < self.min_rows {
            return Err(TrainingError::InvalidInput(format!(
                "max_rows ({}) is below min_rows ({})",
                self.max_rows, self.min_rows
            )));
        }
        Ok(())
    }
}

/// A completed training run.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub path: PathBuf,
}

/// Trains and persists a new model, stamped with the current time.
pub fn train(options: &TrainingOptions) -> TrainingResult<TrainedModel> {
    train_at(options, Utc::now())
}

/// Like [`train`], with an explicit creation instant for the version.
pub fn train_at(options: &TrainingOptions, now: DateTime<Utc>) -> TrainingResult<TrainedModel> {
    options.validate()?;

    let mut dataset = load_dataset(&options.dataset_path)?;
    tracing::info!(
        "loaded {} labeled rows from {} ({} skipped)",
        dataset.len(),
        options.dataset_path.display(),
        dataset.skipped
    );

    if options.max_rows != 0 && dataset.len() > options.max_rows {
        dataset = sample_rows(&dataset, options.max_rows, options.seed);
        tracing::info!("sampled {} rows (seed {})", dataset.len(), options.seed);
    }

    let rows = dataset.len();
    let positives = dataset.positives();
    check_thresholds(rows, positives, options)?;

    let model = LogisticModel::fit(&dataset.samples, &dataset.labels, &options.fit);
    let classifier = Classifier::LogisticRegression(model);
    let validation_instances = validate_batch(&classifier, &dataset)?;

    let mut metrics = BTreeMap::new();
    metrics.insert(
        "validation_instances".to_string(),
        validation_instances as f64,
    );
    if let Some(evaluation) = evaluate_holdout(&dataset, options) {
        metrics.extend(evaluation);
    } else {
        tracing::info!("dataset too small for a held-out evaluation, skipping metrics");
    }

    let latest = discover(&options.output_dir, &options.version_scheme)?
        .into_iter()
        .next()
        .map(|entry| entry.version);
    let version = ModelVersion::generate(&options.version_scheme, now, latest.as_ref());

    let training = TrainingMetadata {
        dataset: dataset_name(&options.dataset_path),
        rows,
        positives,
        base_rate: positives as f64 / rows as f64,
        seed: options.seed,
        metrics,
    };
    let artifact = ModelArtifact::new(version, classifier, training);
    let path = artifact.write_new(&options.output_dir)?;

    tracing::info!("wrote risk model {} to {}", artifact.version, path.display());
    Ok(TrainedModel { artifact, path })
}

fn check_thresholds(
    rows: usize,
    positives: usize,
    options: &TrainingOptions,
) -> Result<(), DataInsufficientError> {
    let required_rows = options.min_rows.max(MIN_TRAINABLE_ROWS);
    if rows < required_rows {
        return Err(DataInsufficientError::Rows {
            rows,
            required: required_rows,
        });
    }

    if positives == 0 {
        return Err(DataInsufficientError::Positives {
            positives,
            required: options.min_positives.max(1),
        });
    }

    if positives < options.min_positives {
        if !options.allow_low_positives {
            return Err(DataInsufficientError::Positives {
                positives,
                required: options.min_positives,
            });
        }
        tracing::warn!(
            "training with {} positives, below the configured minimum of {}",
            positives,
            options.min_positives
        );
    }

    Ok(())
}

/// Seeded sample without replacement, keeping file order.
fn sample_rows(dataset: &LabeledDataset, max_rows: usize, seed: u64) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, dataset.len(), max_rows).into_vec();
    indices.sort_unstable();
    dataset.select(&indices)
}

fn validate_batch(classifier: &Classifier, dataset: &LabeledDataset) -> TrainingResult<usize> {
    let batch = &dataset.samples[..dataset.len().min(VALIDATION_BATCH_SIZE)];
    let probabilities = classifier
        .predict_batch(batch)
        .map_err(|e| TrainingError::Validation(e.to_string()))?;

    if let Some(bad) = probabilities
        .iter()
        .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
    {
        return Err(TrainingError::Validation(format!(
            "probability {bad} is outside [0, 1]"
        )));
    }
    Ok(probabilities.len())
}

/// Fits a separate model on a stratified 80% split and scores the remaining 20%.
fn evaluate_holdout(
    dataset: &LabeledDataset,
    options: &TrainingOptions,
) -> Option<BTreeMap<String, f64>> {
    let positives = dataset.positives();
    let negatives = dataset.len() - positives;
    if positives < EVALUATION_MIN_PER_CLASS
        || negatives < EVALUATION_MIN_PER_CLASS
        || dataset.len() < EVALUATION_MIN_ROWS
    {
        return None;
    }

    let (train_idx, test_idx) = stratified_split(&dataset.labels, EVALUATION_FRACTION, options.seed);
    let train = dataset.select(&train_idx);
    let test = dataset.select(&test_idx);

    let model = LogisticModel::fit(&train.samples, &train.labels, &options.fit);
    let predictions = match model.predict_batch(&test.samples) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("held-out evaluation failed: {}", e);
            return None;
        }
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("roc_auc".to_string(), roc_auc(&predictions, &test.labels));
    metrics.insert(
        "avg_precision".to_string(),
        average_precision(&predictions, &test.labels),
    );
    metrics.insert("brier".to_string(), brier_score(&predictions, &test.labels));
    metrics.insert("holdout_rows".to_string(), test.len() as f64);
    Some(metrics)
}

/// Returns ascending train and test indices with each class split at `test_fraction`.
fn stratified_split(labels: &[bool], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [true, false] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
            .clamp(1, indices.len().saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

fn dataset_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
