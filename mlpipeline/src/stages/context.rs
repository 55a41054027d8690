//! What a stage sees while it runs.

use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::errors::StageError;
use uuid::Uuid;

/// The execution context handed to [`super::Stage::run`].
///
/// Borrows the previous stage's artifact from the orchestrator; a stage
/// can read it but cannot keep it past its own run.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pipeline: &'a str,
    run_id: Uuid,
    stage: StageKind,
    input: Option<&'a Artifact>,
}

impl<'a> StageContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(
        pipeline: &'a str,
        run_id: Uuid,
        stage: StageKind,
        input: Option<&'a Artifact>,
    ) -> Self {
        Self {
            pipeline,
            run_id,
            stage,
            input,
        }
    }

    /// Creates a context for running a stage on its own.
    #[must_use]
    pub fn standalone(stage: StageKind, input: Option<&'a Artifact>) -> Self {
        Self::new("standalone", Uuid::now_v7(), stage, input)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        self.pipeline
    }

    /// Returns the id of the current pipeline run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the stage being run.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Returns the previous stage's artifact, whatever its kind.
    #[must_use]
    pub fn raw_input(&self) -> Option<&'a Artifact> {
        self.input
    }

    /// Returns the previous stage's artifact if it has the expected kind.
    pub fn input(&self, expected: ArtifactKind) -> Result<&'a Artifact, StageError> {
        match self.input {
            Some(artifact) if artifact.kind == expected => Ok(artifact),
            other => Err(StageError::MissingInput {
                expected,
                found: other.map(|a| a.kind),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_kind_is_checked() {
        let artifact = Artifact::new(ArtifactKind::RawData, StageKind::DataIngestion);
        let ctx = StageContext::standalone(StageKind::DataValidation, Some(&artifact));

        assert_eq!(ctx.input(ArtifactKind::RawData).unwrap().id, artifact.id);
        let err = ctx.input(ArtifactKind::FeatureSet).unwrap_err();
        assert!(matches!(
            err,
            StageError::MissingInput {
                expected: ArtifactKind::FeatureSet,
                found: Some(ArtifactKind::RawData)
            }
        ));
    }

    #[test]
    fn test_missing_input() {
        let ctx = StageContext::standalone(StageKind::DataValidation, None);
        let err = ctx.input(ArtifactKind::RawData).unwrap_err();
        assert_eq!(err.to_string(), "expected a raw_data input artifact, found none");
        assert_eq!(ctx.pipeline(), "standalone");
    }
}
