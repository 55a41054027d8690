//! Artifacts handed from one stage to the next.

use super::StageKind;
use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The kind of data an artifact refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The ingested dataset, as fetched.
    RawData,
    /// The dataset after it passed schema validation, plus the report.
    ValidatedData,
    /// Encoded and scaled train/test splits.
    FeatureSet,
    /// Fitted model files and training metadata.
    TrainedModels,
    /// Per-model evaluation metrics.
    Metrics,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawData => write!(f, "raw_data"),
            Self::ValidatedData => write!(f, "validated_data"),
            Self::FeatureSet => write!(f, "feature_set"),
            Self::TrainedModels => write!(f, "trained_models"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

/// An artifact produced by a stage.
///
/// An artifact is a handle: it names the files a stage wrote (by role, such
/// as `"data"` or `"train"`) and may carry a small in-memory JSON payload.
/// It is deliberately not `Clone`; the orchestrator owns it and lends it to
/// the next stage.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// A unique identifier for the artifact.
    pub id: Uuid,

    /// What the artifact refers to.
    pub kind: ArtifactKind,

    /// The stage that produced it.
    pub producer: StageKind,

    /// Files written by the producer, keyed by role.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,

    /// In-memory payload.
    #[serde(default)]
    pub payload: serde_json::Value,

    /// When the artifact was created (ISO 8601).
    pub created_at: String,
}

impl Artifact {
    /// Creates a new artifact with no files and a null payload.
    #[must_use]
    pub fn new(kind: ArtifactKind, producer: StageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            producer,
            files: BTreeMap::new(),
            payload: serde_json::Value::Null,
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// Adds a file under a role.
    #[must_use]
    pub fn with_file(mut self, role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(role.into(), path.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the file registered under `role`.
    pub fn file(&self, role: &str) -> Result<&Path, StageError> {
        self.files
            .get(role)
            .map(PathBuf::as_path)
            .ok_or_else(|| StageError::MissingArtifactFile {
                kind: self.kind,
                role: role.to_string(),
            })
    }

    /// Returns the files whose role starts with `prefix`, with the prefix stripped.
    pub fn files_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Path)> + 'a {
        self.files.iter().filter_map(move |(role, path)| {
            role.strip_prefix(prefix)
                .map(|name| (name, path.as_path()))
        })
    }

    /// Computes a SHA-256 digest over the referenced files' contents.
    ///
    /// Files are hashed in role order, each prefixed with its role, so two
    /// artifacts with the same digest reference byte-identical data.
    pub fn content_digest(&self) -> Result<String, StageError> {
        let mut hasher = Sha256::new();
        for (role, path) in &self.files {
            let bytes = std::fs::read(path).map_err(|e| StageError::io(path, e))?;
            hasher.update(role.as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
