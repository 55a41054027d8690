//! Run state and results.

use crate::core::{Artifact, ArtifactKind, StageKind, StageStatus};
use crate::errors::StageFailure;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Where the orchestrator is in its run.
///
/// Transitions are `Pending -> Running(stage) -> Completed`, or from any
/// `Running(stage)` to `Failed` for that same stage.
#[derive(Debug)]
pub enum PipelineState {
    /// No stage has started.
    Pending,
    /// A stage is executing.
    Running {
        /// The executing stage.
        stage: StageKind,
    },
    /// Every stage returned an artifact.
    Completed,
    /// A stage failed and the remaining stages were skipped.
    Failed(StageFailure),
}

impl PipelineState {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running { stage } => write!(f, "running({stage})"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(failure) => {
                write!(f, "failed({}, {})", failure.stage, failure.error.kind_name())
            }
        }
    }
}

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageKind,
    /// Its final status.
    pub status: StageStatus,
    /// How long it ran, if it ran.
    pub duration_ms: Option<u64>,
    /// The error message, if it failed.
    pub error: Option<String>,
}

impl StageRecord {
    pub(crate) fn pending(stage: StageKind) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            duration_ms: None,
            error: None,
        }
    }
}

/// The outcome of [`super::Orchestrator::run`].
///
/// Owns the artifacts of every stage that completed, in stage order.
#[derive(Debug)]
pub struct PipelineRun {
    pub(crate) pipeline: String,
    pub(crate) run_id: Uuid,
    pub(crate) state: PipelineState,
    pub(crate) records: Vec<StageRecord>,
    pub(crate) artifacts: Vec<Artifact>,
    pub(crate) duration_ms: u64,
}

impl PipelineRun {
    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the final state.
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.state, PipelineState::Completed)
    }

    /// Returns the failure, if the run failed.
    #[must_use]
    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.state {
            PipelineState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns one record per stage, in pipeline order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Returns the record of one stage.
    #[must_use]
    pub fn record(&self, stage: StageKind) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.stage == stage)
    }

    /// Returns the artifacts of the completed stages.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Returns the artifact of a given kind, if its stage completed.
    #[must_use]
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Returns the total run time.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Converts the run into its artifacts, or the failure that stopped it.
    pub fn into_result(self) -> Result<Vec<Artifact>, StageFailure> {
        match self.state {
            PipelineState::Failed(failure) => Err(failure),
            _ => Ok(self.artifacts),
        }
    }

    /// Returns a JSON summary of the run.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "pipeline": self.pipeline,
            "run_id": self.run_id,
            "state": self.state.to_string(),
            "duration_ms": self.duration_ms,
            "stages": self.records,
        })
    }
}
