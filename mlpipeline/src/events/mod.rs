//! Pipeline lifecycle events.
//!
//! The orchestrator reports its progress to an [`EventSink`]. Sinks are
//! handed to the pipeline explicitly; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::fmt;

/// The lifecycle events the orchestrator emits, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineEvent {
    /// Before the first stage.
    PipelineStarted,
    /// A stage is about to run.
    StageStarted,
    /// A stage returned its artifact.
    StageCompleted,
    /// A stage returned an error.
    StageFailed,
    /// Every stage completed.
    PipelineCompleted,
    /// The pipeline stopped at a failed stage.
    PipelineFailed,
}

impl PipelineEvent {
    /// Returns the dotted event name, e.g. `stage.started`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
