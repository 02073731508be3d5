//! # Seriousness Core
//!
//! Patient seriousness scoring: a trained risk model with a deterministic rule-based fallback.
//!
//! This crate contains the scoring logic and artifact management:
//! - Feature extraction from patient records into a fixed-order schema
//! - Training a logistic regression from labeled CSV and writing versioned, immutable artifacts
//! - Discovering and caching the newest valid artifact
//! - Scoring with heuristic fallback, seriousness mapping and ranked contributing factors
//!
//! **No API concerns**: HTTP routing, patient storage and authentication live outside this crate.
//! The `seriousness` CLI is a thin wrapper over the functions exported here.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod explain;
pub mod features;
pub mod heuristic;
pub mod metrics;
pub mod patient;
pub mod registry;
pub mod scoring;
pub mod trainer;
pub mod version;
pub mod vocabulary;

pub use artifact::ModelArtifact;
pub use config::{resolve_artifact_dir, resolve_vocabulary, ScoringConfig};
pub use error::{
    ArtifactLoadError, ConfigError, DataInsufficientError, InferenceError, RegistryError,
    SchemaMismatchError, ScoringError, TrainingError,
};
pub use explain::{Direction, FactorContribution};
pub use features::{FeatureExtractor, FeatureVector};
pub use patient::PatientRecord;
pub use registry::ModelRegistry;
pub use scoring::{
    ActiveModel, RiskBand, RiskScoreResult, ScoringMode, ScoringOutcome, ScoringService,
    SeriousnessLevel,
};
pub use trainer::{train, TrainedModel, TrainingOptions};
pub use version::ModelVersion;
pub use vocabulary::HighRiskVocabulary;
