//! The pipeline configuration document.

use crate::core::StageKind;
use crate::errors::{ConfigError, MissingKey};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// The configuration slice of one stage.
///
/// Holds the stage's output directory (`root_dir`) plus every other key of
/// its section as an untyped option. The entity layer turns it into a typed
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
    kind: StageKind,
    root_dir: PathBuf,
    options: BTreeMap<String, serde_json::Value>,
}

impl StageConfig {
    /// Creates a stage configuration.
    #[must_use]
    pub fn new(
        kind: StageKind,
        root_dir: impl Into<PathBuf>,
        options: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            kind,
            root_dir: root_dir.into(),
            options,
        }
    }

    /// Returns the stage this slice configures.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the section name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Returns the stage's output directory.
    #[must_use]
    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Returns the raw value of an option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }

    /// Returns all options (excluding `root_dir`).
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.options
    }

    /// Returns a required string option.
    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.optional_str(key)?.ok_or_else(|| ConfigError::MissingKeys {
            missing: vec![MissingKey::new(self.name(), key)],
        })
    }

    /// Returns a required path option.
    pub fn require_path(&self, key: &str) -> Result<PathBuf, ConfigError> {
        self.require_str(key).map(PathBuf::from)
    }

    /// Returns an optional string option.
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.options.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.wrong_type(key, "a string", other)),
        }
    }

    /// Returns an optional numeric option.
    pub fn optional_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.options.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| ConfigError::invalid(self.name(), key, "number out of range")),
            Some(other) => Err(self.wrong_type(key, "a number", other)),
        }
    }

    /// Returns an optional non-negative integer option.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.options.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                ConfigError::invalid(self.name(), key, "expected a non-negative integer")
            }),
            Some(other) => Err(self.wrong_type(key, "a non-negative integer", other)),
        }
    }

    /// Returns an optional boolean option.
    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.options.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(key, "true or false", other)),
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &serde_json::Value) -> ConfigError {
        ConfigError::invalid(self.name(), key, format!("expected {expected}, found {found}"))
    }
}

/// The validated pipeline configuration: artifacts root and ordered stages.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    artifacts_root: PathBuf,
    stages: Vec<StageConfig>,
}

/// The pipeline document as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PipelineDocument {
    #[serde(default = "default_artifacts_root")]
    artifacts_root: PathBuf,
    #[serde(default)]
    pipeline: Option<Vec<String>>,
    #[serde(default)]
    stages: BTreeMap<String, Option<BTreeMap<String, serde_json::Value>>>,
}

fn default_artifacts_root() -> PathBuf {
    PathBuf::from("artifacts")
}

impl PipelineConfig {
    /// Returns the directory under which stages write by default.
    #[must_use]
    pub fn artifacts_root(&self) -> &PathBuf {
        &self.artifacts_root
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    /// Looks up the configuration of one stage.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageConfig> {
        self.stages.iter().find(|stage| stage.kind == kind)
    }

    /// Validates a parsed document.
    ///
    /// Every section and every pipeline entry must name a registered stage.
    /// All missing required keys are collected before failing, so one error
    /// reports the whole gap.
    pub(crate) fn from_document(doc: PipelineDocument) -> Result<Self, ConfigError> {
        let mut sections = BTreeMap::new();
        for (name, section) in doc.stages {
            let kind = StageKind::from_name(&name)
                .ok_or_else(|| ConfigError::UndefinedStage { name: name.clone() })?;
            sections.insert(kind, section.unwrap_or_default());
        }

        let order = match doc.pipeline {
            Some(names) => {
                if names.is_empty() {
                    return Err(ConfigError::invalid("pipeline", "pipeline", "no stages listed"));
                }
                let mut seen = HashSet::new();
                let mut order = Vec::with_capacity(names.len());
                for name in names {
                    let kind = StageKind::from_name(&name)
                        .ok_or_else(|| ConfigError::UndefinedStage { name: name.clone() })?;
                    if !seen.insert(kind) {
                        return Err(ConfigError::invalid("pipeline", name, "listed more than once"));
                    }
                    order.push(kind);
                }
                order
            }
            None => StageKind::ALL
                .into_iter()
                .filter(|kind| sections.contains_key(kind))
                .collect(),
        };

        if order.is_empty() {
            return Err(ConfigError::invalid("pipeline", "stages", "no stages configured"));
        }

        let mut missing = Vec::new();
        for kind in &order {
            let section = sections.get(kind);
            for key in kind.required_keys() {
                let present = section
                    .and_then(|s| s.get(*key))
                    .is_some_and(|v| !v.is_null());
                if !present {
                    missing.push(MissingKey::new(kind.as_str(), *key));
                }
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys { missing });
        }

        let mut stages = Vec::with_capacity(order.len());
        for kind in order {
            let mut options = sections.remove(&kind).unwrap_or_default();
            let root_dir = match options.remove("root_dir") {
                Some(serde_json::Value::String(dir)) => PathBuf::from(dir),
                Some(other) => {
                    return Err(ConfigError::invalid(
                        kind.as_str(),
                        "root_dir",
                        format!("expected a string, found {other}"),
                    ))
                }
                None => doc.artifacts_root.join(kind.as_str()),
            };
            stages.push(StageConfig::new(kind, root_dir, options));
        }

        Ok(Self {
            artifacts_root: doc.artifacts_root,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Result<PipelineConfig, ConfigError> {
        let doc: PipelineDocument = serde_yaml::from_str(yaml).unwrap();
        PipelineConfig::from_document(doc)
    }

    const FULL: &str = r"
artifacts_root: out
stages:
  model_trainer:
    root_dir: out/model_trainer
    model_name: model.json
  data_ingestion:
    root_dir: out/data_ingestion
    source_url: data/raw.csv
    local_data_file: out/data_ingestion/data.csv
  data_validation:
    root_dir: out/data_validation
    status_file: out/data_validation/status.txt
";

    #[test]
    fn test_default_order_is_canonical() {
        let config = parse(FULL).unwrap();
        let kinds: Vec<StageKind> = config.stages().iter().map(StageConfig::kind).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::DataIngestion,
                StageKind::DataValidation,
                StageKind::ModelTrainer
            ]
        );
        assert_eq!(config.artifacts_root(), &PathBuf::from("out"));
    }

    #[test]
    fn test_root_dir_is_split_from_options() {
        let config = parse(FULL).unwrap();
        let ingestion = config.stage(StageKind::DataIngestion).unwrap();
        assert_eq!(ingestion.root_dir(), &PathBuf::from("out/data_ingestion"));
        assert!(ingestion.option("root_dir").is_none());
        assert_eq!(ingestion.require_str("source_url").unwrap(), "data/raw.csv");
    }

    #[test]
    fn test_undefined_stage_in_pipeline() {
        let err = parse("pipeline: [data_ingestion, feature_store]\nstages: {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedStage { ref name } if name == "feature_store"));
    }

    #[test]
    fn test_undefined_stage_section() {
        let err = parse("stages:\n  deploy:\n    root_dir: x\n").unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedStage { ref name } if name == "deploy"));
    }

    #[test]
    fn test_all_missing_keys_are_collected() {
        let err = parse(
            "pipeline: [data_ingestion, model_trainer]\nstages:\n  data_ingestion:\n    root_dir: a\n",
        )
        .unwrap_err();

        let ConfigError::MissingKeys { missing } = err else {
            panic!("expected MissingKeys, got {err:?}");
        };
        let rendered: Vec<String> = missing.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "data_ingestion.source_url",
                "data_ingestion.local_data_file",
                "model_trainer.root_dir",
                "model_trainer.model_name",
            ]
        );
    }

    #[test]
    fn test_duplicate_pipeline_entry() {
        let err = parse(
            "pipeline: [data_transformation, data_transformation]\nstages:\n  data_transformation:\n    root_dir: t\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_typed_accessors() {
        let config = parse(
            "stages:\n  data_transformation:\n    root_dir: t\n    test_ratio: 0.2\n    seed: 7\n    scaling: 3\n",
        )
        .unwrap();
        let stage = config.stage(StageKind::DataTransformation).unwrap();

        assert_eq!(stage.optional_f64("test_ratio").unwrap(), Some(0.2));
        assert_eq!(stage.optional_u64("seed").unwrap(), Some(7));
        assert_eq!(stage.optional_f64("missing").unwrap(), None);
        assert!(stage.optional_str("scaling").is_err());
    }
}
