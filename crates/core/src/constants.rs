//! Constants used throughout the seriousness core crate.
//!
//! Artifact naming, scoring thresholds and training defaults live here so they can be
//! tuned without touching the scoring or training logic.

/// Default directory for model artifacts when no explicit directory is configured.
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Filename prefix shared by every trained model artifact.
pub const ARTIFACT_FILE_PREFIX: &str = "risk_model_";

/// Extension of the artifact file itself.
pub const ARTIFACT_EXTENSION: &str = "json";

/// Suffix of the human-readable metadata written next to each artifact.
pub const METADATA_SIDECAR_SUFFIX: &str = ".meta.yaml";

/// Version scheme token for logistic regression artifacts produced by this crate.
pub const MODEL_VERSION_SCHEME: &str = "risk-v1";

/// Model version reported when no trained artifact was used.
pub const HEURISTIC_MODEL_VERSION: &str = "heuristic-v1";

/// Current on-disk artifact format.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Probability at which the risk band moves from low to medium.
pub const RISK_BAND_MEDIUM_THRESHOLD: f64 = 0.33;

/// Probability at which the risk band moves from medium to high.
pub const RISK_BAND_HIGH_THRESHOLD: f64 = 0.66;

/// Seriousness factor at which the level moves from low to moderate.
pub const SERIOUSNESS_MODERATE_THRESHOLD: f64 = 25.0;

/// Seriousness factor at which the level moves from moderate to high.
pub const SERIOUSNESS_HIGH_THRESHOLD: f64 = 55.0;

/// Seriousness factor at which the level moves from high to critical.
pub const SERIOUSNESS_CRITICAL_THRESHOLD: f64 = 80.0;

/// Number of contributing factors reported with each score.
pub const DEFAULT_TOP_FACTORS: usize = 5;

/// Upper clamp for extracted age.
pub const MAX_AGE_YEARS: u32 = 110;

/// Upper clamp for extracted length of stay.
pub const MAX_DAYS_SINCE_ADMISSION: i64 = 30;

/// Default minimum number of labeled rows required to train.
pub const DEFAULT_MIN_ROWS: usize = 25;

/// Default minimum number of positive labels required to train.
pub const DEFAULT_MIN_POSITIVES: usize = 5;

/// Default cap on training rows.
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Default seed for sampling and the evaluation split.
pub const DEFAULT_TRAINING_SEED: u64 = 42;
