//! Stage kind and status enums.

use super::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of stages a pipeline can be assembled from.
///
/// Each kind knows its configuration section name, the keys that section
/// must define, and the artifact kinds it consumes and produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Fetches raw data into the artifacts directory.
    DataIngestion,
    /// Checks the raw data against the schema.
    DataValidation,
    /// Encodes, scales and splits the validated data.
    DataTransformation,
    /// Fits the configured models.
    ModelTrainer,
    /// Scores the fitted models on held-out data.
    ModelEvaluation,
}

impl StageKind {
    /// All stages in canonical pipeline order.
    pub const ALL: [Self; 5] = [
        Self::DataIngestion,
        Self::DataValidation,
        Self::DataTransformation,
        Self::ModelTrainer,
        Self::ModelEvaluation,
    ];

    /// Returns the configuration section name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataIngestion => "data_ingestion",
            Self::DataValidation => "data_validation",
            Self::DataTransformation => "data_transformation",
            Self::ModelTrainer => "model_trainer",
            Self::ModelEvaluation => "model_evaluation",
        }
    }

    /// Looks a stage up by its configuration section name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Returns the human-readable name used in log banners.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DataIngestion => "Data Ingestion stage",
            Self::DataValidation => "Data Validation stage",
            Self::DataTransformation => "Data Transformation stage",
            Self::ModelTrainer => "Model Trainer stage",
            Self::ModelEvaluation => "Model Evaluation stage",
        }
    }

    /// Keys the stage's configuration section must define.
    #[must_use]
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::DataIngestion => &["root_dir", "source_url", "local_data_file"],
            Self::DataValidation => &["root_dir", "status_file"],
            Self::DataTransformation => &["root_dir"],
            Self::ModelTrainer => &["root_dir", "model_name"],
            Self::ModelEvaluation => &["root_dir", "metric_file_name"],
        }
    }

    /// The artifact kind this stage consumes, if any.
    #[must_use]
    pub fn input_kind(&self) -> Option<ArtifactKind> {
        match self {
            Self::DataIngestion => None,
            Self::DataValidation => Some(ArtifactKind::RawData),
            Self::DataTransformation => Some(ArtifactKind::ValidatedData),
            Self::ModelTrainer => Some(ArtifactKind::FeatureSet),
            Self::ModelEvaluation => Some(ArtifactKind::TrainedModels),
        }
    }

    /// The artifact kind this stage produces.
    #[must_use]
    pub fn output_kind(&self) -> ArtifactKind {
        match self {
            Self::DataIngestion => ArtifactKind::RawData,
            Self::DataValidation => ArtifactKind::ValidatedData,
            Self::DataTransformation => ArtifactKind::FeatureSet,
            Self::ModelTrainer => ArtifactKind::TrainedModels,
            Self::ModelEvaluation => ArtifactKind::Metrics,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The execution status of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started yet.
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage returned an artifact.
    Completed,
    /// Stage returned a fatal error.
    Failed,
    /// Stage was never started because an earlier stage failed.
    NotRun,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::NotRun => write!(f, "not_run"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::NotRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_round_trips_through_name() {
        for kind in StageKind::ALL {
            assert_eq!(StageKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(StageKind::from_name("feature_store"), None);
    }

    #[test]
    fn test_canonical_order_forms_a_chain() {
        assert_eq!(StageKind::ALL[0].input_kind(), None);
        for pair in StageKind::ALL.windows(2) {
            assert_eq!(pair[1].input_kind(), Some(pair[0].output_kind()));
        }
    }

    #[test]
    fn test_every_stage_requires_root_dir() {
        for kind in StageKind::ALL {
            assert!(kind.required_keys().contains(&"root_dir"));
        }
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Completed.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::NotRun.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_kind_serialize() {
        let json = serde_json::to_string(&StageKind::ModelTrainer).unwrap();
        assert_eq!(json, r#""model_trainer""#);
        assert_eq!(StageStatus::NotRun.to_string(), "not_run");
    }
}
