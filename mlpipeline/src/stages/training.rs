//! Fitting the configured models.

use super::{Stage, StageContext};
use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::data::{read_csv, DataFrame};
use crate::entity::ModelTrainerConfig;
use crate::errors::{StageError, TrainingError};
use crate::learn::{Estimator, ModelSpec};
use crate::utils::{create_directories, save_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument};

/// What the trainer records about one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// The model file.
    pub path: PathBuf,
    /// Wall-clock fitting time.
    pub duration_ms: u64,
    /// Resolved solver settings.
    pub params: BTreeMap<String, serde_json::Value>,
    /// Solver passes.
    pub iterations: usize,
    /// Whether the solver converged.
    pub converged: bool,
}

/// Fits every model of the hyperparameter document on the training split.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    /// Where a model is saved: `model_name` itself when there is a single
    /// model, otherwise `model_name` prefixed with the lowercased model name.
    fn model_path(&self, spec: &ModelSpec) -> PathBuf {
        let file = if self.config.models.len() == 1 {
            self.config.model_name.clone()
        } else {
            format!("{}_{}", spec.name.to_lowercase(), self.config.model_name)
        };
        self.config.root_dir.join(file)
    }

    fn design(&self, train: &DataFrame) -> Result<(Vec<String>, Vec<Vec<f64>>, Vec<f64>), String> {
        let target = &self.config.target_column;
        if train.column_index(target).is_none() {
            return Err(format!("target column '{target}' not in training data"));
        }
        let features: Vec<String> = train
            .columns()
            .iter()
            .filter(|c| *c != target)
            .cloned()
            .collect();
        let x = train.numeric_matrix(&features).map_err(|e| e.to_string())?;
        let y = train.numeric_column(target).map_err(|e| e.to_string())?;
        Ok((features, x, y))
    }
}

#[async_trait]
impl Stage for ModelTrainer {
    fn kind(&self) -> StageKind {
        StageKind::ModelTrainer
    }

    #[instrument(skip_all, fields(models = self.config.models.len()))]
    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        let input = ctx.input(ArtifactKind::FeatureSet)?;
        let train = read_csv(input.file("train")?).await?;
        let test_file = input.file("test")?;

        let (features, x, y) = self.design(&train).map_err(|reason| {
            let model = self
                .config
                .models
                .first()
                .map_or("<none>", |m| m.name.as_str());
            TrainingError::new(model, reason)
        })?;

        create_directories(&[&self.config.root_dir]).await?;
        let mut artifact = Artifact::new(ArtifactKind::TrainedModels, StageKind::ModelTrainer)
            .with_file("test", test_file);
        let mut records = BTreeMap::new();

        for spec in &self.config.models {
            let started = Instant::now();
            let model = spec
                .fit(&x, &y, &features)
                .map_err(|e| TrainingError::new(&spec.name, e.to_string()))?;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let path = self.model_path(spec);
            save_json(&path, &model).await?;
            info!(
                model = %spec.name,
                duration_ms,
                converged = model.converged,
                path = %path.display(),
                "model trained"
            );

            records.insert(
                spec.name.clone(),
                TrainingRecord {
                    path: path.clone(),
                    duration_ms,
                    params: spec_params(spec),
                    iterations: model.iterations,
                    converged: model.converged,
                },
            );
            artifact = artifact.with_file(format!("model:{}", spec.name), path);
        }

        let metadata = self.config.root_dir.join("training_metadata.json");
        save_json(&metadata, &records).await?;

        Ok(artifact
            .with_file("metadata", metadata)
            .with_payload(serde_json::json!({
                "target_column": self.config.target_column,
                "features": features,
                "models": records,
            })))
    }
}

fn spec_params(spec: &ModelSpec) -> BTreeMap<String, serde_json::Value> {
    let p = &spec.params;
    BTreeMap::from([
        ("alpha".to_string(), serde_json::json!(p.alpha)),
        ("l1_ratio".to_string(), serde_json::json!(p.l1_ratio)),
        ("max_iter".to_string(), serde_json::json!(p.max_iter)),
        ("tol".to_string(), serde_json::json!(p.tol)),
        ("fit_intercept".to_string(), serde_json::json!(p.fit_intercept)),
    ])
}
