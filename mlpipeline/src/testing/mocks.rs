//! Mock stages and trackers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::errors::{StageError, TrackingReportError, TransformationError};
use crate::stages::{Stage, StageContext};
use crate::tracking::Tracker;

/// A shared, ordered record of which stages ran.
pub type CallLog = Arc<Mutex<Vec<StageKind>>>;

/// A stage that stands in for a real one.
///
/// By default it declares the artifact kinds of its [`StageKind`], checks
/// that it received its input and returns an empty artifact of its output
/// kind.
#[derive(Debug)]
pub struct MockStage {
    kind: StageKind,
    input_kind: Option<ArtifactKind>,
    output_kind: ArtifactKind,
    failure: Option<String>,
    calls: AtomicUsize,
    log: Option<CallLog>,
}

impl MockStage {
    /// Creates a mock for `kind`.
    #[must_use]
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            input_kind: kind.input_kind(),
            output_kind: kind.output_kind(),
            failure: None,
            calls: AtomicUsize::new(0),
            log: None,
        }
    }

    /// Creates a mock that fails with a [`TransformationError`].
    #[must_use]
    pub fn failing(kind: StageKind, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(kind)
        }
    }

    /// Overrides the declared artifact kinds.
    #[must_use]
    pub fn with_kinds(mut self, input: Option<ArtifactKind>, output: ArtifactKind) -> Self {
        self.input_kind = input;
        self.output_kind = output;
        self
    }

    /// Appends the stage kind to `log` on every run.
    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns how many times the stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for MockStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn input_kind(&self) -> Option<ArtifactKind> {
        self.input_kind
    }

    fn output_kind(&self) -> ArtifactKind {
        self.output_kind
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().push(self.kind);
        }
        if let Some(expected) = self.input_kind {
            ctx.input(expected)?;
        }
        if let Some(reason) = &self.failure {
            return Err(TransformationError::new(reason.clone()).into());
        }
        Ok(Artifact::new(self.output_kind, self.kind))
    }
}

/// One call received by a [`CollectingTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedEvent {
    /// `start_run`.
    Started {
        /// Experiment name.
        experiment: String,
        /// Run name.
        run_name: String,
    },
    /// `log_params`.
    Params {
        /// Run id.
        run_id: String,
        /// Logged params.
        params: BTreeMap<String, String>,
    },
    /// `log_metrics`.
    Metrics {
        /// Run id.
        run_id: String,
        /// Logged metrics.
        metrics: BTreeMap<String, f64>,
    },
    /// `log_artifact`.
    Artifact {
        /// Run id.
        run_id: String,
        /// Attached file.
        path: PathBuf,
    },
    /// `end_run`.
    Ended {
        /// Run id.
        run_id: String,
    },
}

/// A tracker that keeps every call in memory.
#[derive(Debug, Default)]
pub struct CollectingTracker {
    events: Mutex<Vec<TrackedEvent>>,
}

impl CollectingTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the calls received so far.
    #[must_use]
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events.lock().clone()
    }

    /// Returns the run names that were started.
    #[must_use]
    pub fn run_names(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TrackedEvent::Started { run_name, .. } => Some(run_name.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TrackedEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl Tracker for CollectingTracker {
    fn sink_name(&self) -> String {
        "collecting".to_string()
    }

    async fn start_run(
        &self,
        experiment: &str,
        run_name: &str,
    ) -> Result<String, TrackingReportError> {
        self.push(TrackedEvent::Started {
            experiment: experiment.to_string(),
            run_name: run_name.to_string(),
        });
        Ok(format!("run-{run_name}"))
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        self.push(TrackedEvent::Params {
            run_id: run_id.to_string(),
            params: params.clone(),
        });
        Ok(())
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        self.push(TrackedEvent::Metrics {
            run_id: run_id.to_string(),
            metrics: metrics.clone(),
        });
        Ok(())
    }

    async fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), TrackingReportError> {
        self.push(TrackedEvent::Artifact {
            run_id: run_id.to_string(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn end_run(&self, run_id: &str) -> Result<(), TrackingReportError> {
        self.push(TrackedEvent::Ended {
            run_id: run_id.to_string(),
        });
        Ok(())
    }
}

/// A tracker whose every call fails, like an unreachable server.
#[derive(Debug, Default)]
pub struct FailingTracker;

impl FailingTracker {
    fn fail<T>(&self) -> Result<T, TrackingReportError> {
        Err(TrackingReportError::new(self.sink_name(), "connection refused"))
    }
}

#[async_trait]
impl Tracker for FailingTracker {
    fn sink_name(&self) -> String {
        "failing".to_string()
    }

    async fn start_run(&self, _: &str, _: &str) -> Result<String, TrackingReportError> {
        self.fail()
    }

    async fn log_params(
        &self,
        _: &str,
        _: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        self.fail()
    }

    async fn log_metrics(
        &self,
        _: &str,
        _: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        self.fail()
    }

    async fn log_artifact(&self, _: &str, _: &Path) -> Result<(), TrackingReportError> {
        self.fail()
    }

    async fn end_run(&self, _: &str) -> Result<(), TrackingReportError> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_stage_records_calls() {
        let log = CallLog::default();
        let stage = MockStage::new(StageKind::DataIngestion).with_call_log(log.clone());
        let ctx = StageContext::standalone(StageKind::DataIngestion, None);

        let artifact = stage.run(&ctx).await.unwrap();
        assert_eq!(artifact.kind, ArtifactKind::RawData);
        assert_eq!(stage.call_count(), 1);
        assert_eq!(*log.lock(), vec![StageKind::DataIngestion]);
    }

    #[tokio::test]
    async fn test_mock_stage_requires_input() {
        let stage = MockStage::new(StageKind::DataValidation);
        let ctx = StageContext::standalone(StageKind::DataValidation, None);
        let err = stage.run(&ctx).await.unwrap_err();
        assert!(matches!(err, StageError::MissingInput { .. }));
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let stage = MockStage::failing(StageKind::DataIngestion, "boom");
        let ctx = StageContext::standalone(StageKind::DataIngestion, None);
        let err = stage.run(&ctx).await.unwrap_err();
        assert_eq!(err.kind_name(), "TransformationError");
    }

    #[tokio::test]
    async fn test_failing_tracker() {
        let err = FailingTracker.start_run("e", "r").await.unwrap_err();
        assert_eq!(err.sink, "failing");
    }
}
