//! Sequential pipeline execution.

use super::state::{PipelineRun, PipelineState, StageRecord};
use crate::core::{Artifact, StageKind, StageStatus};
use crate::errors::StageFailure;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::{Stage, StageContext};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Runs a validated chain of stages, one after the other.
///
/// Built by [`super::PipelineBuilder::build`]. [`Orchestrator::run`] takes
/// the orchestrator by value, so a pipeline can only be run once.
#[derive(Debug)]
pub struct Orchestrator {
    name: String,
    stages: Vec<Box<dyn Stage>>,
    event_sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub(crate) fn new(
        name: String,
        stages: Vec<Box<dyn Stage>>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            stages,
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Runs every stage in order and stops at the first failure.
    ///
    /// Each stage borrows the artifact of the stage before it. Stages after
    /// a failed one never start and are recorded as `NotRun`.
    #[instrument(skip_all, fields(pipeline = %self.name, run_id = tracing::field::Empty))]
    pub async fn run(self) -> PipelineRun {
        let run_id = Uuid::now_v7();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();

        let mut records: Vec<StageRecord> = self
            .stages
            .iter()
            .map(|s| StageRecord::pending(s.kind()))
            .collect();
        let mut artifacts: Vec<Artifact> = Vec::with_capacity(self.stages.len());
        let mut state = PipelineState::Pending;

        self.emit(
            PipelineEvent::PipelineStarted,
            json!({"pipeline": self.name, "run_id": run_id, "stages": self.stage_kinds()}),
        )
        .await;

        for (idx, stage) in self.stages.iter().enumerate() {
            let kind = stage.kind();
            state = PipelineState::Running { stage: kind };
            records[idx].status = StageStatus::Running;
            info!(">>>>>> {} started <<<<<<", kind.display_name());
            self.emit(PipelineEvent::StageStarted, json!({"stage": kind, "run_id": run_id}))
                .await;

            let ctx = StageContext::new(&self.name, run_id, kind, artifacts.last());
            let stage_started = Instant::now();
            let result = stage.run(&ctx).await;
            let duration_ms = elapsed_ms(stage_started);
            records[idx].duration_ms = Some(duration_ms);

            match result {
                Ok(artifact) => {
                    records[idx].status = StageStatus::Completed;
                    info!(
                        artifact = %artifact.id,
                        duration_ms,
                        ">>>>>> {} completed <<<<<<",
                        kind.display_name()
                    );
                    self.emit(
                        PipelineEvent::StageCompleted,
                        json!({
                            "stage": kind,
                            "run_id": run_id,
                            "artifact_id": artifact.id,
                            "artifact_kind": artifact.kind,
                            "duration_ms": duration_ms,
                        }),
                    )
                    .await;
                    artifacts.push(artifact);
                }
                Err(err) => {
                    records[idx].status = StageStatus::Failed;
                    records[idx].error = Some(err.to_string());
                    for record in &mut records[idx + 1..] {
                        record.status = StageStatus::NotRun;
                    }
                    error!(
                        stage = %kind,
                        error_kind = err.kind_name(),
                        error = %err,
                        duration_ms,
                        "stage failed, stopping pipeline"
                    );
                    self.emit(
                        PipelineEvent::StageFailed,
                        json!({
                            "stage": kind,
                            "run_id": run_id,
                            "error_kind": err.kind_name(),
                            "error": err.to_string(),
                            "duration_ms": duration_ms,
                        }),
                    )
                    .await;
                    state = PipelineState::Failed(StageFailure {
                        stage: kind,
                        error: err,
                    });
                    break;
                }
            }
        }

        if !state.is_terminal() {
            state = PipelineState::Completed;
        }
        let duration_ms = elapsed_ms(started);

        match &state {
            PipelineState::Failed(failure) => {
                self.emit(
                    PipelineEvent::PipelineFailed,
                    json!({
                        "pipeline": self.name,
                        "run_id": run_id,
                        "stage": failure.stage,
                        "error_kind": failure.error.kind_name(),
                        "duration_ms": duration_ms,
                    }),
                )
                .await;
            }
            _ => {
                info!(duration_ms, stages = artifacts.len(), "pipeline completed");
                self.emit(
                    PipelineEvent::PipelineCompleted,
                    json!({"pipeline": self.name, "run_id": run_id, "duration_ms": duration_ms}),
                )
                .await;
            }
        }

        PipelineRun {
            pipeline: self.name,
            run_id,
            state,
            records,
            artifacts,
            duration_ms,
        }
    }

    async fn emit(&self, event: PipelineEvent, data: serde_json::Value) {
        self.event_sink.emit(event, data).await;
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::super::PipelineBuilder;
    use super::*;
    use crate::core::ArtifactKind;
    use crate::errors::StageError;
    use crate::events::CollectingEventSink;
    use crate::testing::{CallLog, MockStage};
    use pretty_assertions::assert_eq;

    fn pipeline(failing: Option<StageKind>, log: &CallLog, sink: Arc<CollectingEventSink>) -> Orchestrator {
        StageKind::ALL
            .into_iter()
            .fold(PipelineBuilder::new("test"), |builder, kind| {
                let stage = if failing == Some(kind) {
                    MockStage::failing(kind, "boom")
                } else {
                    MockStage::new(kind)
                };
                builder.stage(Box::new(stage.with_call_log(log.clone())))
            })
            .with_event_sink(sink)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_completes_in_order() {
        let log = CallLog::default();
        let sink = Arc::new(CollectingEventSink::new());

        let run = pipeline(None, &log, sink.clone()).run().await;

        assert!(run.is_completed());
        assert_eq!(*log.lock(), StageKind::ALL.to_vec());
        assert_eq!(run.artifacts().len(), 5);
        assert!(run.artifact(ArtifactKind::Metrics).is_some());
        assert!(run
            .records()
            .iter()
            .all(|r| r.status == StageStatus::Completed && r.duration_ms.is_some()));

        let names = sink.names();
        assert_eq!(names.first(), Some(&"pipeline.started"));
        assert_eq!(names.last(), Some(&"pipeline.completed"));
        assert_eq!(sink.events_of_type("stage.completed").len(), 5);
    }

    #[tokio::test]
    async fn test_failure_stops_the_pipeline() {
        let log = CallLog::default();
        let sink = Arc::new(CollectingEventSink::new());

        let run = pipeline(Some(StageKind::DataValidation), &log, sink.clone())
            .run()
            .await;

        assert_eq!(
            *log.lock(),
            vec![StageKind::DataIngestion, StageKind::DataValidation]
        );
        let failure = run.failure().unwrap();
        assert_eq!(failure.stage, StageKind::DataValidation);
        assert!(matches!(failure.error, StageError::Transformation(_)));

        let statuses: Vec<StageStatus> = run.records().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Completed,
                StageStatus::Failed,
                StageStatus::NotRun,
                StageStatus::NotRun,
                StageStatus::NotRun,
            ]
        );
        assert_eq!(run.artifacts().len(), 1);
        assert_eq!(sink.names().last(), Some(&"pipeline.failed"));
        assert_eq!(sink.events_of_type("stage.failed")[0].1["stage"], "data_validation");
    }

    #[tokio::test]
    async fn test_each_stage_gets_previous_artifact() {
        // MockStage fails with MissingInput if its input is absent or of the
        // wrong kind, so completion proves the hand-over.
        let log = CallLog::default();
        let run = pipeline(None, &log, Arc::new(CollectingEventSink::new()))
            .run()
            .await;
        let kinds: Vec<ArtifactKind> = run.artifacts().iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            StageKind::ALL.iter().map(|k| k.output_kind()).collect::<Vec<_>>()
        );
    }
}
