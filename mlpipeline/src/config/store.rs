//! Loading the three configuration documents.

use super::pipeline::PipelineDocument;
use super::schema::SchemaDocument;
use super::{HyperparamSet, PipelineConfig, SchemaSpec, StageConfig};
use crate::core::StageKind;
use crate::entity::ConfigurationManager;
use crate::errors::ConfigError;
use crate::utils::read_yaml;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Locations of the three configuration documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Pipeline settings (`config/config.yaml`).
    pub config: PathBuf,
    /// Data schema (`schema.yaml`).
    pub schema: PathBuf,
    /// Hyperparameters (`params.yaml`).
    pub params: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

impl ConfigPaths {
    /// Creates paths from explicit locations.
    #[must_use]
    pub fn new(
        config: impl Into<PathBuf>,
        schema: impl Into<PathBuf>,
        params: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: config.into(),
            schema: schema.into(),
            params: params.into(),
        }
    }

    /// Uses the conventional project layout under `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            config: dir.join("config").join("config.yaml"),
            schema: dir.join("schema.yaml"),
            params: dir.join("params.yaml"),
        }
    }
}

/// The three documents, loaded and validated.
///
/// Immutable once built; stages only ever see it through shared references.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pipeline: PipelineConfig,
    schema: SchemaSpec,
    params: HyperparamSet,
}

impl LoadedConfig {
    /// Assembles a configuration from already-validated parts.
    #[must_use]
    pub fn new(pipeline: PipelineConfig, schema: SchemaSpec, params: HyperparamSet) -> Self {
        Self {
            pipeline,
            schema,
            params,
        }
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Returns the data schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaSpec {
        &self.schema
    }

    /// Returns the hyperparameters.
    #[must_use]
    pub fn params(&self) -> &HyperparamSet {
        &self.params
    }

    /// Returns the configuration of one stage, if the pipeline includes it.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageConfig> {
        self.pipeline.stage(kind)
    }
}

/// Reads and validates the configuration documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigStore;

impl ConfigStore {
    /// Loads the pipeline, schema and hyperparameter documents.
    ///
    /// Reads nothing but the three documents. Fails if a document is
    /// missing, empty or malformed, if it names a stage that is not
    /// registered, or if any stage in the pipeline lacks a required key or
    /// has a value it cannot use. That includes a schema without a target
    /// column when training or evaluation is configured, and a
    /// hyperparameter document naming an unknown model family.
    pub fn load(paths: &ConfigPaths) -> Result<LoadedConfig, ConfigError> {
        let config = Self::read(paths)?;
        ConfigurationManager::new(Arc::new(config.clone())).check()?;

        info!(
            stages = config.pipeline().stages().len(),
            columns = config.schema().columns().len(),
            models = config.params().len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parses the documents without checking per-stage requirements.
    pub(crate) fn read(paths: &ConfigPaths) -> Result<LoadedConfig, ConfigError> {
        let pipeline_doc: PipelineDocument = read_yaml(&paths.config)?;
        let schema_doc: SchemaDocument = read_yaml(&paths.schema)?;
        let params: HyperparamSet = read_yaml(&paths.params)?;

        let pipeline = PipelineConfig::from_document(pipeline_doc)?;
        let schema = SchemaSpec::from_document(schema_doc)?;
        Ok(LoadedConfig::new(pipeline, schema, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MissingKey;
    use crate::testing::{write_project, ProjectFixture};

    #[test]
    fn test_load_valid_project() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_project(dir.path(), "age,quality\n30,5\n40,6\n").unwrap();

        let config = ConfigStore::load(&paths).unwrap();
        assert_eq!(config.pipeline().stages().len(), StageKind::ALL.len());
        assert_eq!(config.schema().target_column(), Some("quality"));
        assert!(config.params().model("ElasticNet").is_some());
        for kind in StageKind::ALL {
            let stage = config.stage(kind).unwrap();
            for key in kind.required_keys().iter().filter(|k| **k != "root_dir") {
                assert!(stage.option(key).is_some(), "{kind} lacks {key}");
            }
        }
    }

    #[test]
    fn test_missing_params_document() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_project(dir.path(), "age,quality\n30,5\n").unwrap();
        std::fs::remove_file(&paths.params).unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref path } if *path == paths.params));
    }

    #[test]
    fn test_malformed_schema_document() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_project(dir.path(), "age,quality\n30,5\n").unwrap();
        std::fs::write(&paths.schema, "columns: [age, quality\n").unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_top_level_key_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_project(dir.path(), "age,quality\n30,5\n").unwrap();
        let original = std::fs::read_to_string(&paths.config).unwrap();
        std::fs::write(&paths.config, format!("{original}\nstagez: {{}}\n")).unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_missing_target_column_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path())
            .with_schema("columns:\n  age: int\n  quality: int\n")
            .with_params("RandomForest: {}\n")
            .write()
            .unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        let ConfigError::MissingKeys { missing } = err else {
            panic!("expected missing keys, got {err}");
        };
        assert_eq!(missing, vec![MissingKey::new("schema", "target_column")]);
    }

    #[test]
    fn test_unknown_model_family_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path())
            .with_params("RandomForest: {}\n")
            .write()
            .unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RandomForest"));
    }

    #[test]
    fn test_target_column_optional_without_model_stages() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path())
            .with_stages(&[StageKind::DataIngestion, StageKind::DataValidation])
            .with_schema("columns:\n  age: int\n  quality: int\n")
            .write()
            .unwrap();

        assert!(ConfigStore::load(&paths).is_ok());
    }

    #[test]
    fn test_zero_tracking_timeout_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectFixture::new(dir.path()).write().unwrap();
        let config = std::fs::read_to_string(&paths.config).unwrap();
        std::fs::write(
            &paths.config,
            config.replace(
                "    metric_file_name: metrics.json\n",
                "    metric_file_name: metrics.json\n    tracking_timeout_seconds: 0\n",
            ),
        )
        .unwrap();

        let err = ConfigStore::load(&paths).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "tracking_timeout_seconds")
        );
    }

    #[test]
    fn test_in_dir_layout() {
        let paths = ConfigPaths::in_dir("/proj");
        assert_eq!(paths.config, PathBuf::from("/proj/config/config.yaml"));
        assert_eq!(paths.schema, PathBuf::from("/proj/schema.yaml"));
        assert_eq!(paths.params, PathBuf::from("/proj/params.yaml"));
    }
}
