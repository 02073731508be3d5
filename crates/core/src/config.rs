//! Scoring runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the scoring service. Nothing in the request path reads environment variables or
//! configuration files, so concurrent callers and tests always see a consistent setup.

use crate::constants::{DEFAULT_ARTIFACT_DIR, DEFAULT_TOP_FACTORS, MODEL_VERSION_SCHEME};
use crate::error::{ConfigError, ConfigResult};
use crate::vocabulary::HighRiskVocabulary;
use std::path::{Path, PathBuf};

/// Scoring configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ScoringConfig {
    artifact_dir: PathBuf,
    version_prefix: String,
    top_factors: usize,
    vocabulary: HighRiskVocabulary,
}

impl ScoringConfig {
    /// Create a new `ScoringConfig`.
    pub fn new(
        artifact_dir: PathBuf,
        version_prefix: String,
        top_factors: usize,
        vocabulary: HighRiskVocabulary,
    ) -> ConfigResult<Self> {
        if version_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidInput(
                "version_prefix cannot be empty".into(),
            ));
        }
        if top_factors == 0 {
            return Err(ConfigError::InvalidInput(
                "top_factors must be at least 1".into(),
            ));
        }

        Ok(Self {
            artifact_dir,
            version_prefix,
            top_factors,
            vocabulary,
        })
    }

    /// Default prefix, factor count and vocabulary for the given artifact directory.
    pub fn with_artifact_dir(artifact_dir: PathBuf) -> Self {
        Self {
            artifact_dir,
            version_prefix: MODEL_VERSION_SCHEME.to_string(),
            top_factors: DEFAULT_TOP_FACTORS,
            vocabulary: HighRiskVocabulary::default(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn version_prefix(&self) -> &str {
        &self.version_prefix
    }

    pub fn top_factors(&self) -> usize {
        self.top_factors
    }

    pub fn vocabulary(&self) -> &HighRiskVocabulary {
        &self.vocabulary
    }
}

/// Resolve the artifact directory without reading environment variables.
///
/// Uses `override_dir` when provided, otherwise `artifacts/` relative to the current working
/// directory. The directory does not need to exist yet.
pub fn resolve_artifact_dir(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR))
}

/// Load the vocabulary from `path`, or the built-in defaults when no file is configured.
pub fn resolve_vocabulary(path: Option<&Path>) -> ConfigResult<HighRiskVocabulary> {
    match path {
        Some(path) => HighRiskVocabulary::load(path),
        None => Ok(HighRiskVocabulary::default()),
    }
}
