//! Stage trait and implementations.
//!
//! Stages are the units of work in a pipeline. Each one consumes the
//! previous stage's artifact and returns a new one.

mod context;
mod evaluation;
mod ingestion;
mod training;
mod transformation;
mod validation;

pub use context::StageContext;
pub use evaluation::ModelEvaluation;
pub use ingestion::DataIngestion;
pub use training::{ModelTrainer, TrainingRecord};
pub use transformation::{
    engineer_features, DataTransformation, Encoding, EngineeredFeatures, FeatureTransform,
    FittedTransform,
};
pub use validation::{validate_frame, DataValidation, ValidationReport};

use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::entity::ConfigurationManager;
use crate::errors::{ConfigError, StageError};
use crate::tracking::{tracker_from_uri, Tracker};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Trait for pipeline stages.
///
/// The orchestrator only ever sees `Box<dyn Stage>`; it chains stages by
/// their declared artifact kinds and never by their concrete type.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns which stage this is.
    fn kind(&self) -> StageKind;

    /// The artifact kind the stage consumes, if any.
    fn input_kind(&self) -> Option<ArtifactKind> {
        self.kind().input_kind()
    }

    /// The artifact kind the stage produces.
    fn output_kind(&self) -> ArtifactKind {
        self.kind().output_kind()
    }

    /// Runs the stage.
    ///
    /// Files may be left behind on failure, but no artifact is returned.
    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError>;
}

/// Builds the stage for `kind` from its typed configuration.
///
/// `tracker` overrides the evaluation stage's configured tracking URI.
pub fn build_stage(
    kind: StageKind,
    manager: &ConfigurationManager,
    tracker: Option<Arc<dyn Tracker>>,
) -> Result<Box<dyn Stage>, ConfigError> {
    Ok(match kind {
        StageKind::DataIngestion => Box::new(DataIngestion::new(manager.data_ingestion_config()?)),
        StageKind::DataValidation => {
            Box::new(DataValidation::new(manager.data_validation_config()?))
        }
        StageKind::DataTransformation => {
            Box::new(DataTransformation::new(manager.data_transformation_config()?))
        }
        StageKind::ModelTrainer => Box::new(ModelTrainer::new(manager.model_trainer_config()?)),
        StageKind::ModelEvaluation => {
            let config = manager.model_evaluation_config()?;
            let tracker = match tracker {
                Some(tracker) => tracker,
                None => tracker_from_uri(
                    config.tracking_uri.as_deref(),
                    &config.root_dir,
                    Duration::from_secs(config.tracking_timeout_seconds),
                )?,
            };
            Box::new(ModelEvaluation::new(config, tracker))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::testing::ProjectFixture;

    #[test]
    fn test_build_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path()).write().unwrap();
        let manager = ConfigurationManager::new(Arc::new(ConfigStore::load(&paths).unwrap()));

        for kind in StageKind::ALL {
            let stage = build_stage(kind, &manager, None).unwrap();
            assert_eq!(stage.kind(), kind);
            assert_eq!(stage.input_kind(), kind.input_kind());
            assert_eq!(stage.output_kind(), kind.output_kind());
        }
    }

    #[test]
    fn test_build_stage_outside_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path())
            .with_stages(&[StageKind::DataIngestion])
            .write()
            .unwrap();
        let manager = ConfigurationManager::new(Arc::new(ConfigStore::load(&paths).unwrap()));

        let err = build_stage(StageKind::ModelTrainer, &manager, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKeys { .. }));
    }
}
