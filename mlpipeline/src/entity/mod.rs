//! Typed per-stage configuration records.
//!
//! [`ConfigurationManager`] turns the untyped [`StageConfig`] slices of a
//! [`LoadedConfig`] into the records each stage is built with. Records are
//! created once per run and never mutated.

use crate::config::{HyperparamSet, LoadedConfig, SchemaSpec, StageConfig};
use crate::core::StageKind;
use crate::errors::{ConfigError, MissingKey};
use crate::learn::ModelSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_TEST_RATIO: f64 = 0.25;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_EXPERIMENT: &str = "mlpipeline";
const DEFAULT_TRACKING_TIMEOUT_SECONDS: u64 = 10;

/// Settings of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIngestionConfig {
    /// Output directory.
    pub root_dir: PathBuf,
    /// Where to fetch from: a path, a `file://` URI or an http(s) URL.
    pub source_url: String,
    /// Where to write the fetched data.
    pub local_data_file: PathBuf,
    /// HTTP timeout.
    pub timeout_seconds: u64,
    /// Download http(s) sources even when `local_data_file` already exists.
    pub force_download: bool,
}

/// Settings of the validation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValidationConfig {
    /// Output directory.
    pub root_dir: PathBuf,
    /// Where to write `Validation status: <bool>`.
    pub status_file: PathBuf,
    /// The schema to validate against.
    pub schema: Arc<SchemaSpec>,
}

/// How numeric features are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Zero mean, unit variance.
    #[default]
    Standard,
    /// Rescale to `[0, 1]`.
    MinMax,
    /// Leave values as they are.
    None,
}

impl FromStr for Scaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "min_max" | "minmax" => Ok(Self::MinMax),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown scaling '{other}', expected standard, min_max or none"
            )),
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::MinMax => write!(f, "min_max"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Settings of the transformation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTransformationConfig {
    /// Output directory.
    pub root_dir: PathBuf,
    /// Share of rows held out for testing, in `(0, 1)`.
    pub test_ratio: f64,
    /// Seed of the split shuffle.
    pub seed: u64,
    /// Feature scaling.
    pub scaling: Scaling,
    /// Column left unscaled and unencoded.
    pub target_column: Option<String>,
}

/// Settings of the training stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTrainerConfig {
    /// Output directory.
    pub root_dir: PathBuf,
    /// File name of the fitted model.
    pub model_name: String,
    /// The models to fit, ordered by name.
    pub models: Vec<ModelSpec>,
    /// The column to predict.
    pub target_column: String,
}

/// Settings of the evaluation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluationConfig {
    /// Output directory.
    pub root_dir: PathBuf,
    /// File name of the metrics document.
    pub metric_file_name: String,
    /// Tracking destination; see [`crate::tracking::tracker_from_uri`].
    pub tracking_uri: Option<String>,
    /// Per-request timeout of remote tracking servers.
    pub tracking_timeout_seconds: u64,
    /// Experiment name reported to the tracker.
    pub experiment: String,
    /// The column to predict.
    pub target_column: String,
    /// Hyperparameters, echoed to the tracker.
    pub params: Arc<HyperparamSet>,
}

impl ModelEvaluationConfig {
    /// Returns the metrics file path.
    #[must_use]
    pub fn metric_file(&self) -> PathBuf {
        self.root_dir.join(&self.metric_file_name)
    }
}

/// Builds the typed stage records from a loaded configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: Arc<LoadedConfig>,
    schema: Arc<SchemaSpec>,
    params: Arc<HyperparamSet>,
}

impl ConfigurationManager {
    /// Wraps a loaded configuration.
    #[must_use]
    pub fn new(config: Arc<LoadedConfig>) -> Self {
        let schema = Arc::new(config.schema().clone());
        let params = Arc::new(config.params().clone());
        Self {
            config,
            schema,
            params,
        }
    }

    /// Returns the loaded configuration.
    #[must_use]
    pub fn config(&self) -> &LoadedConfig {
        &self.config
    }

    fn section(&self, kind: StageKind) -> Result<&StageConfig, ConfigError> {
        self.config
            .stage(kind)
            .ok_or_else(|| ConfigError::MissingKeys {
                missing: vec![MissingKey::new("stages", kind.as_str())],
            })
    }

    fn positive_u64(section: &StageConfig, key: &str, default: u64) -> Result<u64, ConfigError> {
        let value = section.optional_u64(key)?.unwrap_or(default);
        if value == 0 {
            return Err(ConfigError::invalid(section.name(), key, "must be at least 1"));
        }
        Ok(value)
    }

    fn target_column(&self) -> Result<String, ConfigError> {
        self.schema
            .target_column()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingKeys {
                missing: vec![MissingKey::new("schema", "target_column")],
            })
    }

    /// Builds the ingestion record.
    pub fn data_ingestion_config(&self) -> Result<DataIngestionConfig, ConfigError> {
        let section = self.section(StageKind::DataIngestion)?;
        let timeout_seconds = Self::positive_u64(section, "timeout_seconds", DEFAULT_TIMEOUT_SECONDS)?;
        Ok(DataIngestionConfig {
            root_dir: section.root_dir().clone(),
            source_url: section.require_str("source_url")?.to_string(),
            local_data_file: section.require_path("local_data_file")?,
            timeout_seconds,
            force_download: section.optional_bool("force_download")?.unwrap_or(false),
        })
    }

    /// Builds the validation record.
    pub fn data_validation_config(&self) -> Result<DataValidationConfig, ConfigError> {
        let section = self.section(StageKind::DataValidation)?;
        Ok(DataValidationConfig {
            root_dir: section.root_dir().clone(),
            status_file: section.require_path("status_file")?,
            schema: Arc::clone(&self.schema),
        })
    }

    /// Builds the transformation record.
    pub fn data_transformation_config(&self) -> Result<DataTransformationConfig, ConfigError> {
        let section = self.section(StageKind::DataTransformation)?;

        let test_ratio = section
            .optional_f64("test_ratio")?
            .unwrap_or(DEFAULT_TEST_RATIO);
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(ConfigError::invalid(
                section.name(),
                "test_ratio",
                format!("{test_ratio} is not between 0 and 1"),
            ));
        }

        let scaling = match section.optional_str("scaling")? {
            Some(raw) => raw
                .parse()
                .map_err(|reason: String| ConfigError::invalid(section.name(), "scaling", reason))?,
            None => Scaling::default(),
        };

        Ok(DataTransformationConfig {
            root_dir: section.root_dir().clone(),
            test_ratio,
            seed: section.optional_u64("seed")?.unwrap_or(DEFAULT_SEED),
            scaling,
            target_column: self.schema.target_column().map(str::to_string),
        })
    }

    /// Builds the training record.
    ///
    /// Every model in the hyperparameter document must map to a known model
    /// family, and the schema must name a target column.
    pub fn model_trainer_config(&self) -> Result<ModelTrainerConfig, ConfigError> {
        let section = self.section(StageKind::ModelTrainer)?;
        let model_name = section.require_str("model_name")?.to_string();

        if self.params.is_empty() {
            return Err(ConfigError::invalid(
                "params",
                "models",
                "no models defined in the hyperparameter document",
            ));
        }
        let models = self
            .params
            .iter()
            .map(|(name, params)| {
                ModelSpec::from_hyperparams(name, params)
                    .map_err(|e| ConfigError::invalid("params", name, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModelTrainerConfig {
            root_dir: section.root_dir().clone(),
            model_name,
            models,
            target_column: self.target_column()?,
        })
    }

    /// Builds the evaluation record.
    pub fn model_evaluation_config(&self) -> Result<ModelEvaluationConfig, ConfigError> {
        let section = self.section(StageKind::ModelEvaluation)?;
        Ok(ModelEvaluationConfig {
            root_dir: section.root_dir().clone(),
            metric_file_name: section.require_str("metric_file_name")?.to_string(),
            tracking_uri: section.optional_str("tracking_uri")?.map(str::to_string),
            tracking_timeout_seconds: Self::positive_u64(
                section,
                "tracking_timeout_seconds",
                DEFAULT_TRACKING_TIMEOUT_SECONDS,
            )?,
            experiment: section
                .optional_str("experiment")?
                .unwrap_or(DEFAULT_EXPERIMENT)
                .to_string(),
            target_column: self.target_column()?,
            params: Arc::clone(&self.params),
        })
    }

    /// Builds the record of every stage in the pipeline and discards it.
    ///
    /// Missing keys are reported together in one [`ConfigError::MissingKeys`].
    /// Otherwise the first invalid value is returned.
    pub fn check(&self) -> Result<(), ConfigError> {
        let mut missing: Vec<MissingKey> = Vec::new();
        let mut invalid = None;

        for stage in self.config.pipeline().stages() {
            let result = match stage.kind() {
                StageKind::DataIngestion => self.data_ingestion_config().map(drop),
                StageKind::DataValidation => self.data_validation_config().map(drop),
                StageKind::DataTransformation => self.data_transformation_config().map(drop),
                StageKind::ModelTrainer => self.model_trainer_config().map(drop),
                StageKind::ModelEvaluation => self.model_evaluation_config().map(drop),
            };
            match result {
                Ok(()) => {}
                Err(ConfigError::MissingKeys { missing: keys }) => {
                    for key in keys {
                        if !missing.contains(&key) {
                            missing.push(key);
                        }
                    }
                }
                Err(err) if invalid.is_none() => invalid = Some(err),
                Err(_) => {}
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys { missing });
        }
        invalid.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, ConfigStore};
    use crate::testing::ProjectFixture;
    use pretty_assertions::assert_eq;

    fn manager_for(fixture: &ProjectFixture) -> ConfigurationManager {
        let paths: ConfigPaths = fixture.write().unwrap();
        ConfigurationManager::new(Arc::new(ConfigStore::read(&paths).unwrap()))
    }

    #[test]
    fn test_records_from_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(&ProjectFixture::new(dir.path()));

        let ingestion = manager.data_ingestion_config().unwrap();
        assert_eq!(ingestion.timeout_seconds, 30);
        assert!(ingestion.local_data_file.starts_with(dir.path()));

        let validation = manager.data_validation_config().unwrap();
        assert_eq!(validation.schema.target_column(), Some("quality"));

        let transformation = manager.data_transformation_config().unwrap();
        assert_eq!(transformation.scaling, Scaling::Standard);
        assert_eq!(transformation.seed, 42);
        assert_eq!(transformation.target_column.as_deref(), Some("quality"));

        let trainer = manager.model_trainer_config().unwrap();
        assert_eq!(trainer.target_column, "quality");
        assert_eq!(trainer.models.len(), 1);
        assert_eq!(trainer.models[0].name, "ElasticNet");

        let evaluation = manager.model_evaluation_config().unwrap();
        assert_eq!(evaluation.experiment, "mlpipeline");
        assert_eq!(evaluation.metric_file(), evaluation.root_dir.join("metrics.json"));
    }

    #[test]
    fn test_transformation_options() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(
            &ProjectFixture::new(dir.path())
                .with_transformation_options("    test_ratio: 0.5\n    seed: 7\n    scaling: min_max\n"),
        );
        let config = manager.data_transformation_config().unwrap();
        assert!((config.test_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.seed, 7);
        assert_eq!(config.scaling, Scaling::MinMax);
    }

    #[test]
    fn test_bad_test_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(
            &ProjectFixture::new(dir.path()).with_transformation_options("    test_ratio: 1.5\n"),
        );
        let err = manager.data_transformation_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "test_ratio"));
    }

    #[test]
    fn test_bad_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(
            &ProjectFixture::new(dir.path()).with_transformation_options("    scaling: robust\n"),
        );
        assert!(manager.data_transformation_config().is_err());
    }

    #[test]
    fn test_unknown_model_family() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager_for(&ProjectFixture::new(dir.path()).with_params("RandomForest: {}\n"));
        let err = manager.model_trainer_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RandomForest"));
    }

    #[test]
    fn test_missing_target_column() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_for(
            &ProjectFixture::new(dir.path())
                .with_schema("columns:\n  age: int\n  quality: int\n"),
        );
        let err = manager.model_trainer_config().unwrap_err();
        assert_eq!(err.to_string(), "missing required configuration keys: schema.target_column");
    }

    #[test]
    fn test_scaling_parse() {
        assert_eq!("MinMax".parse::<Scaling>().unwrap(), Scaling::MinMax);
        assert_eq!("none".parse::<Scaling>().unwrap(), Scaling::None);
        assert!("log".parse::<Scaling>().is_err());
    }
}
