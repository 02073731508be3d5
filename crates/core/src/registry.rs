//! Model registry: discovers versioned artifacts on disk and caches the active one.
//!
//! The artifact directory is append-only. Training adds files, nothing rewrites them, so the
//! newest valid file is always the right model. Listing the directory is cheap compared with
//! parsing an artifact, so every lookup lists it and only re-parses when the newest version on
//! disk differs from the cached one (or the caller asks for [`Freshness::Latest`]).
//!
//! A file that failed to load is remembered with its modification time and skipped by cached
//! lookups until it changes on disk.
//!
//! The cache holds `Arc<ModelArtifact>` values behind a `RwLock`. A refresh swaps the `Arc` in a
//! single write, so concurrent readers see either the old artifact or the new one.

use crate::artifact::{parse_artifact_file_name, ModelArtifact};
use crate::error::{ArtifactLoadError, RegistryError, RegistryResult};
use crate::version::ModelVersion;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// Whether a lookup may be answered from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Freshness {
    /// Reuse the cached artifact while it is still the newest on disk.
    #[default]
    Cached,
    /// Re-read the newest artifact even if it is already cached.
    Latest,
}

/// An artifact file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub version: ModelVersion,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// Lists artifacts for `version_prefix` in `dir`, newest first.
///
/// Ordering is by the timestamp embedded in the file name, then by modification time. A missing
/// directory is treated as empty.
pub fn discover(dir: &Path, version_prefix: &str) -> RegistryResult<Vec<ArtifactEntry>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(RegistryError::DirectoryRead {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut entries = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        let Some(version) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_artifact_file_name(n, version_prefix))
        else {
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        entries.push(ArtifactEntry {
            version,
            path,
            modified: metadata.modified().ok(),
        });
    }

    entries.sort_by(|a, b| {
        b.version
            .created_at()
            .cmp(&a.version.created_at())
            .then_with(|| b.modified.cmp(&a.modified))
    });
    Ok(entries)
}

/// Loads and caches the newest valid artifact per directory.
///
/// Construct one per process (or per test) and share it; nothing here is global.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    cache: RwLock<HashMap<PathBuf, Arc<ModelArtifact>>>,
    failed: RwLock<HashMap<PathBuf, (SystemTime, ArtifactLoadError)>>,
    last_load_error: RwLock<Option<ArtifactLoadError>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the newest valid artifact in `dir`, or `None` if there are no artifacts yet.
    pub fn load_latest(
        &self,
        dir: &Path,
        version_prefix: &str,
    ) -> RegistryResult<Option<Arc<ModelArtifact>>> {
        self.load(dir, version_prefix, Freshness::Cached)
    }

    /// Like [`ModelRegistry::load_latest`], with explicit control over cache reuse.
    ///
    /// Unreadable artifacts are skipped in favour of the next older one and remembered as the
    /// last load error. Only when every candidate fails is an error returned.
    pub fn load(
        &self,
        dir: &Path,
        version_prefix: &str,
        freshness: Freshness,
    ) -> RegistryResult<Option<Arc<ModelArtifact>>> {
        let entries = discover(dir, version_prefix)?;
        if entries.is_empty() {
            self.evict(dir);
            return Ok(None);
        }

        let cached = self.cached(dir);
        let mut last_error = None;
        self.set_last_load_error(None);

        for entry in entries {
            if freshness == Freshness::Cached {
                if let Some(cached) = cached.as_ref().filter(|c| c.version == entry.version) {
                    return Ok(Some(Arc::clone(cached)));
                }
                if let Some(e) = self.known_failure(&entry) {
                    self.set_last_load_error(Some(e.clone()));
                    last_error = Some(e);
                    continue;
                }
            }

            match read_entry(&entry) {
                Ok(artifact) => {
                    let artifact = Arc::new(artifact);
                    self.store(dir, Arc::clone(&artifact));
                    self.forget_failure(&entry.path);
                    tracing::info!(
                        "loaded risk model {} from {}",
                        artifact.version,
                        entry.path.display()
                    );
                    return Ok(Some(artifact));
                }
                Err(e) => {
                    tracing::warn!("unable to load risk model: {}", e);
                    self.remember_failure(&entry, &e);
                    self.set_last_load_error(Some(e.clone()));
                    last_error = Some(e);
                }
            }
        }

        self.evict(dir);
        match last_error {
            Some(e) => Err(RegistryError::ArtifactLoad(e)),
            None => Ok(None),
        }
    }

    /// Version currently cached for `dir`, without touching the filesystem.
    pub fn cached_version(&self, dir: &Path) -> Option<ModelVersion> {
        self.cached(dir).map(|artifact| artifact.version.clone())
    }

    /// Failure from the most recent lookup, including artifacts skipped in favour of an older one.
    /// Cleared once the newest artifact on disk loads.
    pub fn last_load_error(&self) -> Option<ArtifactLoadError> {
        self.last_load_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached(&self, dir: &Path) -> Option<Arc<ModelArtifact>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned()
    }

    fn store(&self, dir: &Path, artifact: Arc<ModelArtifact>) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf(), artifact);
    }

    fn evict(&self, dir: &Path) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(dir);
    }

    /// Earlier failure for this file, if it has not been modified since.
    fn known_failure(&self, entry: &ArtifactEntry) -> Option<ArtifactLoadError> {
        let modified = entry.modified?;
        self.failed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entry.path)
            .filter(|(at, _)| *at == modified)
            .map(|(_, e)| e.clone())
    }

    fn remember_failure(&self, entry: &ArtifactEntry, error: &ArtifactLoadError) {
        let mut failed = self.failed.write().unwrap_or_else(PoisonError::into_inner);
        match entry.modified {
            Some(modified) => {
                failed.insert(entry.path.clone(), (modified, error.clone()));
            }
            None => {
                failed.remove(&entry.path);
            }
        }
    }

    fn forget_failure(&self, path: &Path) {
        self.failed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    fn set_last_load_error(&self, error: Option<ArtifactLoadError>) {
        *self
            .last_load_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }
}

fn read_entry(entry: &ArtifactEntry) -> Result<ModelArtifact, ArtifactLoadError> {
    let artifact = ModelArtifact::read(&entry.path)?;
    if artifact.version != entry.version {
        return Err(ArtifactLoadError {
            path: entry.path.clone(),
            reason: format!(
                "embedded version {} does not match file name version {}",
                artifact.version, entry.version
            ),
        });
    }
    Ok(artifact)
}
