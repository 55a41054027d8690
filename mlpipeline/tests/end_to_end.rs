//! End-to-end runs over on-disk projects.

use mlpipeline::core::{ArtifactKind, StageKind, StageStatus};
use mlpipeline::errors::{ConfigError, PipelineError, SchemaViolation, StageError};
use mlpipeline::events::CollectingEventSink;
use mlpipeline::pipeline::{load_orchestrator, PipelineRun, PipelineState};
use mlpipeline::testing::{sample_csv, CollectingTracker, FailingTracker, ProjectFixture};
use mlpipeline::tracking::Tracker;
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn run(fixture: &ProjectFixture, tracker: Option<Arc<dyn Tracker>>) -> PipelineRun {
    let paths = fixture.write().unwrap();
    load_orchestrator(&paths, tracker, None).unwrap().run().await
}

#[tokio::test]
async fn full_pipeline_produces_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ProjectFixture::new(dir.path());
    let tracker = Arc::new(CollectingTracker::new());
    let sink = Arc::new(CollectingEventSink::new());

    let paths = fixture.write().unwrap();
    let run = load_orchestrator(&paths, Some(tracker.clone()), Some(sink.clone()))
        .unwrap()
        .run()
        .await;

    assert!(run.is_completed(), "{}", run.state());
    assert_eq!(run.artifacts().len(), 5);
    assert!(run
        .records()
        .iter()
        .all(|r| r.status == StageStatus::Completed));

    let metrics = run.artifact(ArtifactKind::Metrics).unwrap();
    assert!(metrics.payload["models"]["ElasticNet"]["r2"].is_f64());
    assert_eq!(metrics.payload["tracking_reported"], true);

    let metric_file = fixture
        .stage_dir(StageKind::ModelEvaluation)
        .join("metrics.json");
    assert!(metric_file.exists());
    assert!(fixture
        .stage_dir(StageKind::ModelTrainer)
        .join("model.json")
        .exists());

    assert_eq!(tracker.run_names(), vec!["ElasticNet".to_string()]);
    assert_eq!(sink.names().first(), Some(&"pipeline.started"));
    assert_eq!(sink.names().last(), Some(&"pipeline.completed"));
}

#[tokio::test]
async fn default_tracking_writes_local_run_log() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ProjectFixture::new(dir.path());

    let run = run(&fixture, None).await;

    assert!(run.is_completed(), "{}", run.state());
    let log = fixture
        .stage_dir(StageKind::ModelEvaluation)
        .join("mlruns")
        .join("tracking.jsonl");
    let text = std::fs::read_to_string(log).unwrap();
    assert!(text.contains("run_started"));
    assert!(text.contains("run_finished"));
}

#[tokio::test]
async fn null_age_stops_the_pipeline_at_validation() {
    let dir = tempfile::tempdir().unwrap();
    // The first data row has age 20; blank it out.
    let csv = sample_csv(20).replacen("\n20,", "\n,", 1);
    let fixture = ProjectFixture::new(dir.path()).with_csv(csv);
    let tracker = Arc::new(CollectingTracker::new());

    let run = run(&fixture, Some(tracker.clone())).await;

    let PipelineState::Failed(failure) = run.state() else {
        panic!("expected a failed run, got {}", run.state());
    };
    assert_eq!(failure.stage, StageKind::DataValidation);
    let StageError::SchemaViolation(violation) = &failure.error else {
        panic!("expected a schema violation, got {:?}", failure.error);
    };
    assert_eq!(
        violation.for_column("age"),
        vec![&SchemaViolation::NullValue {
            column: "age".to_string(),
            row: 0
        }]
    );

    for stage in [
        StageKind::DataTransformation,
        StageKind::ModelTrainer,
        StageKind::ModelEvaluation,
    ] {
        assert_eq!(run.record(stage).unwrap().status, StageStatus::NotRun);
    }
    assert!(!fixture
        .stage_dir(StageKind::DataTransformation)
        .join("train.csv")
        .exists());
    assert!(tracker.events().is_empty());

    let status = std::fs::read_to_string(
        fixture
            .stage_dir(StageKind::DataValidation)
            .join("status.txt"),
    )
    .unwrap();
    assert_eq!(status, "Validation status: false");
}

#[tokio::test]
async fn tracking_failure_does_not_fail_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ProjectFixture::new(dir.path());

    let run = run(&fixture, Some(Arc::new(FailingTracker))).await;

    assert!(run.is_completed(), "{}", run.state());
    let metrics = run.artifact(ArtifactKind::Metrics).unwrap();
    assert_eq!(metrics.payload["tracking_reported"], false);
    assert!(metrics.payload["models"]["ElasticNet"]["rmse"].is_f64());
}

#[tokio::test]
async fn every_configured_model_is_trained_and_scored() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ProjectFixture::new(dir.path())
        .with_params("ElasticNet: { alpha: 0.1, l1_ratio: 0.5 }\nRidge: { alpha: 1.0 }\n");
    let tracker = Arc::new(CollectingTracker::new());

    let run = run(&fixture, Some(tracker.clone())).await;

    assert!(run.is_completed(), "{}", run.state());
    let metrics = run.artifact(ArtifactKind::Metrics).unwrap();
    assert!(metrics.payload["models"]["Ridge"]["mae"].is_f64());
    assert!(fixture
        .stage_dir(StageKind::ModelTrainer)
        .join("ridge_model.json")
        .exists());
    assert_eq!(
        tracker.run_names(),
        vec!["ElasticNet".to_string(), "Ridge".to_string()]
    );
}

#[tokio::test]
async fn transformation_is_deterministic() {
    let stages = [
        StageKind::DataIngestion,
        StageKind::DataValidation,
        StageKind::DataTransformation,
    ];
    let mut digests = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let fixture = ProjectFixture::new(dir.path()).with_stages(&stages);
        let run = run(&fixture, None).await;
        assert!(run.is_completed(), "{}", run.state());
        let features = run.artifact(ArtifactKind::FeatureSet).unwrap();
        digests.push(features.content_digest().unwrap());
    }
    assert_eq!(digests[0], digests[1]);
}

#[test]
fn malformed_config_fails_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = ProjectFixture::new(dir.path());
    let paths = fixture.write().unwrap();
    std::fs::write(&paths.config, "stages: [unclosed\n").unwrap();

    let err = load_orchestrator(&paths, None, None).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)), "{err}");
    assert!(!fixture.artifacts_root().exists());
}

#[test]
fn missing_required_key_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ProjectFixture::new(dir.path()).write().unwrap();
    let config = std::fs::read_to_string(&paths.config).unwrap();
    std::fs::write(&paths.config, config.replace("    model_name: model.json\n", "")).unwrap();

    let err = load_orchestrator(&paths, None, None).unwrap_err();
    let PipelineError::Config(ConfigError::MissingKeys { missing }) = &err else {
        panic!("expected missing keys, got {err}");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].to_string(), "model_trainer.model_name");
}

#[test]
fn broken_stage_chain_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ProjectFixture::new(dir.path())
        .with_stages(&[StageKind::DataIngestion, StageKind::DataTransformation])
        .write()
        .unwrap();

    let err = load_orchestrator(&paths, None, None).unwrap_err();
    let PipelineError::Validation(validation) = &err else {
        panic!("expected a validation error, got {err}");
    };
    assert_eq!(validation.code(), Some("CHAIN-BROKEN"));
}
