//! Error types for the mlpipeline crate.
//!
//! Errors are split by when they can happen:
//!
//! - [`ConfigError`] and [`PipelineValidationError`] are raised while the
//!   pipeline is being assembled, before any stage runs.
//! - [`StageError`] covers the fatal failures a stage can report; the
//!   orchestrator pairs it with the failing stage in a [`StageFailure`].
//! - [`TrackingReportError`] is non-fatal and never leaves the evaluation
//!   stage.

use crate::config::ColumnType;
use crate::core::{ArtifactKind, StageKind};
use crate::data::FrameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The top-level error returned when a pipeline cannot be assembled.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration documents are missing, malformed or incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The stage chain is not well formed.
    #[error(transparent)]
    Validation(#[from] PipelineValidationError),
}

/// A required key that was absent from a stage section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingKey {
    /// The stage section the key belongs to.
    pub stage: String,
    /// The missing key.
    pub key: String,
}

impl MissingKey {
    /// Creates a new missing key entry.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage, self.key)
    }
}

/// Errors raised while loading the configuration documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required document does not exist.
    #[error("configuration document not found: {}", path.display())]
    Missing {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// A document exists but could not be read.
    #[error("failed to read configuration document {}: {source}", path.display())]
    Read {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document is not valid YAML or does not have the expected shape.
    #[error("malformed configuration document {}: {source}", path.display())]
    Malformed {
        /// The document path.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_yaml::Error,
    },

    /// A document has no content.
    #[error("configuration document {} is empty", path.display())]
    Empty {
        /// The document path.
        path: PathBuf,
    },

    /// The pipeline references a stage that is not registered.
    #[error("pipeline references undefined stage '{name}'")]
    UndefinedStage {
        /// The unknown stage name.
        name: String,
    },

    /// One or more required keys are absent.
    #[error("missing required configuration keys: {}", join_display(missing))]
    MissingKeys {
        /// Every missing key, across all stages.
        missing: Vec<MissingKey>,
    },

    /// A key is present but its value cannot be used.
    #[error("invalid value for '{key}' in {section}: {reason}")]
    InvalidValue {
        /// The section holding the key (stage name, `schema` or `params`).
        section: String,
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(
        section: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Metadata about a pipeline definition error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CHAIN-BROKEN").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is rejected before execution.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<StageKind>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageKind>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Ingestion could not read its configured source.
#[derive(Debug, Clone, Error)]
#[error("source '{location}' is unavailable: {reason}")]
pub struct SourceUnavailableError {
    /// The configured source location.
    pub location: String,
    /// Why it could not be read.
    pub reason: String,
}

impl SourceUnavailableError {
    /// Creates a new source unavailable error.
    #[must_use]
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// A single schema check that did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaViolation {
    /// A column required by the schema is absent from the data.
    MissingColumn {
        /// The column name.
        column: String,
    },
    /// The data has a column the schema does not declare.
    UnexpectedColumn {
        /// The column name.
        column: String,
    },
    /// A value does not have the declared type.
    TypeMismatch {
        /// The column name.
        column: String,
        /// Zero-based data row index.
        row: usize,
        /// The declared type.
        expected: ColumnType,
        /// The type observed in the data.
        found: String,
    },
    /// A null value in a column that does not allow nulls.
    NullValue {
        /// The column name.
        column: String,
        /// Zero-based data row index.
        row: usize,
    },
}

impl SchemaViolation {
    /// Returns the column this violation concerns.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::MissingColumn { column }
            | Self::UnexpectedColumn { column }
            | Self::TypeMismatch { column, .. }
            | Self::NullValue { column, .. } => column,
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "column '{column}' is missing"),
            Self::UnexpectedColumn { column } => {
                write!(f, "column '{column}' is not declared in the schema")
            }
            Self::TypeMismatch {
                column,
                row,
                expected,
                found,
            } => write!(
                f,
                "column '{column}' row {row}: expected {expected}, found {found}"
            ),
            Self::NullValue { column, row } => {
                write!(f, "column '{column}' row {row}: null value not allowed")
            }
        }
    }
}

/// How many violations the error message lists before summarizing the rest.
pub const MAX_RENDERED_VIOLATIONS: usize = 20;

/// Validation found the data does not match the schema.
///
/// Carries every violation found, not only the first. The message lists at
/// most [`MAX_RENDERED_VIOLATIONS`] of them.
#[derive(Debug, Clone, Error)]
#[error(
    "schema validation failed with {} violation(s): {}",
    violations.len(),
    join_capped(violations, MAX_RENDERED_VIOLATIONS)
)]
pub struct SchemaViolationError {
    /// All violations, in discovery order.
    pub violations: Vec<SchemaViolation>,
}

impl SchemaViolationError {
    /// Creates a new schema violation error.
    #[must_use]
    pub fn new(violations: Vec<SchemaViolation>) -> Self {
        Self { violations }
    }

    /// Returns the violations for one column.
    #[must_use]
    pub fn for_column(&self, column: &str) -> Vec<&SchemaViolation> {
        self.violations
            .iter()
            .filter(|v| v.column() == column)
            .collect()
    }
}

/// Feature engineering could not be applied.
#[derive(Debug, Clone, Error)]
#[error("transformation failed: {reason}")]
pub struct TransformationError {
    /// Why the transformation failed.
    pub reason: String,
}

impl TransformationError {
    /// Creates a new transformation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A model could not be fitted.
#[derive(Debug, Clone, Error)]
#[error("training model '{model}' failed: {reason}")]
pub struct TrainingError {
    /// The model name from the hyperparameter document.
    pub model: String,
    /// Why fitting failed.
    pub reason: String,
}

impl TrainingError {
    /// Creates a new training error.
    #[must_use]
    pub fn new(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// A trained model could not be scored.
#[derive(Debug, Clone, Error)]
#[error("evaluating model '{model}' failed: {reason}")]
pub struct EvaluationError {
    /// The model name.
    pub model: String,
    /// Why scoring failed.
    pub reason: String,
}

impl EvaluationError {
    /// Creates a new evaluation error.
    #[must_use]
    pub fn new(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

/// The experiment tracking sink rejected or could not receive a report.
///
/// Never fatal: evaluation logs it and carries on.
#[derive(Debug, Clone, Error)]
#[error("tracking sink '{sink}' failed: {reason}")]
pub struct TrackingReportError {
    /// The sink name.
    pub sink: String,
    /// Why reporting failed.
    pub reason: String,
}

impl TrackingReportError {
    /// Creates a new tracking report error.
    #[must_use]
    pub fn new(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// A fatal error reported by a stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Ingestion could not read its source.
    #[error(transparent)]
    SourceUnavailable(#[from] SourceUnavailableError),

    /// Validation found schema violations.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolationError),

    /// Feature engineering failed.
    #[error(transparent)]
    Transformation(#[from] TransformationError),

    /// Model fitting failed.
    #[error(transparent)]
    Training(#[from] TrainingError),

    /// Model scoring failed.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The stage did not receive the artifact it declares as input.
    #[error("expected a {expected} input artifact, found {}", describe_kind(found))]
    MissingInput {
        /// The declared input kind.
        expected: ArtifactKind,
        /// What was actually handed over.
        found: Option<ArtifactKind>,
    },

    /// An artifact does not reference a file the stage needs.
    #[error("{kind} artifact has no '{role}' file")]
    MissingArtifactFile {
        /// The artifact kind.
        kind: ArtifactKind,
        /// The file role that was looked up.
        role: String,
    },

    /// Reading or writing a stage file failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A data file is not well-formed CSV.
    #[error("malformed data file {}: {source}", path.display())]
    MalformedData {
        /// The file being parsed.
        path: PathBuf,
        /// What the parser rejected.
        source: FrameError,
    },

    /// A JSON document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StageError {
    /// Creates an I/O error bound to a path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a parse error bound to a path.
    #[must_use]
    pub fn malformed(path: impl AsRef<Path>, source: FrameError) -> Self {
        Self::MalformedData {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns the taxonomy name of this error.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "SourceUnavailableError",
            Self::SchemaViolation(_) => "SchemaViolationError",
            Self::Transformation(_) => "TransformationError",
            Self::Training(_) => "TrainingError",
            Self::Evaluation(_) => "EvaluationError",
            Self::MissingInput { .. } | Self::MissingArtifactFile { .. } => "ArtifactError",
            Self::Io { .. } => "IoError",
            Self::MalformedData { .. } => "MalformedDataError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

/// A fatal stage error with the failing stage attached.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: StageKind,
    /// What went wrong.
    #[source]
    pub error: StageError,
}

fn describe_kind(kind: &Option<ArtifactKind>) -> String {
    kind.map_or_else(|| "none".to_string(), |k| k.to_string())
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_capped<T: fmt::Display>(items: &[T], limit: usize) -> String {
    let shown = join_display(&items[..items.len().min(limit)]);
    match items.len().saturating_sub(limit) {
        0 => shown,
        rest => format!("{shown}; and {rest} more"),
    }
}
