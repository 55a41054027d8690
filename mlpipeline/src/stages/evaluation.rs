//! Scoring the trained models and reporting to the tracker.

use super::{Stage, StageContext};
use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::data::read_csv;
use crate::entity::ModelEvaluationConfig;
use crate::errors::{EvaluationError, StageError, TrackingReportError};
use crate::learn::{FittedModel, RegressionMetrics};
use crate::tracking::Tracker;
use crate::utils::{create_directories, load_json, save_json};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Scores every trained model on the held-out split.
///
/// Tracking is best effort: when the tracker fails, the failure is logged
/// and the metrics are still written and returned.
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
    tracker: Arc<dyn Tracker>,
}

impl ModelEvaluation {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: ModelEvaluationConfig, tracker: Arc<dyn Tracker>) -> Self {
        Self { config, tracker }
    }

    async fn report(
        &self,
        model: &str,
        metrics: &RegressionMetrics,
        metric_file: &Path,
    ) -> Result<(), TrackingReportError> {
        let run_id = self.tracker.start_run(&self.config.experiment, model).await?;
        let logged = self.log_run(&run_id, model, metrics, metric_file).await;
        // An opened run is always closed; the first failure wins.
        let ended = self.tracker.end_run(&run_id).await;
        logged.and(ended)
    }

    async fn log_run(
        &self,
        run_id: &str,
        model: &str,
        metrics: &RegressionMetrics,
        metric_file: &Path,
    ) -> Result<(), TrackingReportError> {
        self.tracker
            .log_params(run_id, &self.config.params.flat_params(model))
            .await?;
        self.tracker.log_metrics(run_id, &metrics.to_map()).await?;
        self.tracker.log_artifact(run_id, metric_file).await
    }
}

#[async_trait]
impl Stage for ModelEvaluation {
    fn kind(&self) -> StageKind {
        StageKind::ModelEvaluation
    }

    #[instrument(skip_all, fields(tracker = %self.tracker.sink_name()))]
    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        let input = ctx.input(ArtifactKind::TrainedModels)?;
        let test = read_csv(input.file("test")?).await?;
        let target = &self.config.target_column;

        let models: Vec<(&str, &Path)> = input.files_with_prefix("model:").collect();
        if models.is_empty() {
            return Err(EvaluationError::new("<none>", "no trained models to evaluate").into());
        }

        let y_true = test
            .numeric_column(target)
            .map_err(|e| EvaluationError::new(models[0].0, e.to_string()))?;

        let mut scores = BTreeMap::new();
        for (name, path) in &models {
            let model: FittedModel = load_json(path).await?;
            let x = test
                .numeric_matrix(&model.feature_names)
                .map_err(|e| EvaluationError::new(*name, e.to_string()))?;
            let metrics = model
                .predict(&x)
                .and_then(|y_pred| RegressionMetrics::compute(&y_true, &y_pred))
                .map_err(|e| EvaluationError::new(*name, e.to_string()))?;

            info!(
                model = *name,
                rmse = metrics.rmse,
                mae = metrics.mae,
                r2 = metrics.r2,
                "model evaluated"
            );
            scores.insert((*name).to_string(), metrics);
        }

        let metric_file = self.config.metric_file();
        create_directories(&[&self.config.root_dir]).await?;
        save_json(&metric_file, &scores).await?;

        let mut tracking_reported = true;
        for (name, metrics) in &scores {
            if let Err(e) = self.report(name, metrics, &metric_file).await {
                warn!(model = %name, error = %e, "tracking report failed, continuing");
                tracking_reported = false;
            }
        }

        Ok(Artifact::new(ArtifactKind::Metrics, StageKind::ModelEvaluation)
            .with_file("metrics", metric_file)
            .with_payload(json!({
                "models": scores,
                "tracking_reported": tracking_reported,
            })))
    }
}
