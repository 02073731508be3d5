use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read vocabulary file {path}: {source}", path = .path.display())]
    VocabularyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse vocabulary file: {0}")]
    VocabularyParse(serde_yaml::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// The labeled dataset cannot support a training run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataInsufficientError {
    #[error("not enough labeled rows to train: rows={rows}, required>={required}")]
    Rows { rows: usize, required: usize },
    #[error("not enough positive labels to train: positives={positives}, required>={required}")]
    Positives { positives: usize, required: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    DataInsufficient(#[from] DataInsufficientError),
    #[error("invalid training options: {0}")]
    InvalidInput(String),
    #[error("training dataset not found: {path}", path = .0.display())]
    DatasetNotFound(PathBuf),
    #[error("failed to read training dataset: {0}")]
    DatasetRead(#[from] csv::Error),
    #[error("prediction validation failed: {0}")]
    Validation(String),
    #[error("failed to create artifact directory: {0}")]
    ArtifactDirCreation(std::io::Error),
    #[error("failed to write artifact: {0}")]
    ArtifactWrite(std::io::Error),
    #[error("artifact already exists: {path}", path = .0.display())]
    ArtifactExists(PathBuf),
    #[error("failed to serialize artifact: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to serialize artifact metadata: {0}")]
    MetadataSerialization(serde_yaml::Error),
    #[error("failed to inspect existing artifacts: {0}")]
    Registry(#[from] RegistryError),
}

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

/// An artifact file exists but could not be read or decoded.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load artifact {path}: {reason}", path = .path.display())]
pub struct ArtifactLoadError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read artifact directory {path}: {source}", path = .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// The artifact was trained against a different feature order than the extractor produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("artifact feature order [{}] does not match extractor schema [{}]", .found.join(", "), .expected.join(", "))]
pub struct SchemaMismatchError {
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("model expects {expected} inputs, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("model produced a non-finite probability")]
    NonFinite,
}

/// Why a score was produced by the heuristic instead of a trained model.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("no trained model artifact available")]
    NoArtifact,
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),
    #[error("artifact registry unavailable: {0}")]
    Registry(RegistryError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl From<RegistryError> for ScoringError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ArtifactLoad(load) => ScoringError::ArtifactLoad(load),
            other => ScoringError::Registry(other),
        }
    }
}
