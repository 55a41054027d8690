//! On-disk project fixtures.

use crate::config::ConfigPaths;
use crate::core::StageKind;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_SCHEMA: &str = "\
columns:
  age: { type: int, nullable: false }
  income: float
  city: string
  quality: int
target_column: quality
";

const DEFAULT_PARAMS: &str = "ElasticNet: { alpha: 0.2, l1_ratio: 0.1 }\n";

const CITIES: [&str; 3] = ["Faro", "Lisbon", "Porto"];

/// Generates a deterministic dataset matching the default fixture schema.
///
/// `quality` is a noisy linear function of the other columns, so the
/// default models fit it reasonably well.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_csv(rows: usize) -> String {
    let mut out = String::from("age,income,city,quality\n");
    for i in 0..rows {
        let age = 20 + (i * 7) % 40;
        let income = 1500.0 + ((i * 37) % 100) as f64 * 12.5;
        let city = i % CITIES.len();
        let noise = ((i * 13) % 5) as f64 * 0.1;
        let quality = (age as f64 * 0.1 + income / 1000.0 + city as f64 + noise).round();
        let _ = writeln!(out, "{age},{income},{},{quality}", CITIES[city]);
    }
    out
}

/// Writes a complete project (three documents plus a source CSV) into a
/// directory, with every path absolute.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    root: PathBuf,
    csv: String,
    schema: String,
    params: String,
    pipeline: Option<Vec<StageKind>>,
    source_url: Option<String>,
    transformation_options: String,
    tracking_uri: String,
}

impl ProjectFixture {
    /// Creates a fixture with the default dataset, schema and params.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            csv: sample_csv(40),
            schema: DEFAULT_SCHEMA.to_string(),
            params: DEFAULT_PARAMS.to_string(),
            pipeline: None,
            source_url: None,
            transformation_options: String::new(),
            tracking_uri: String::new(),
        }
    }

    /// Replaces the source data.
    #[must_use]
    pub fn with_csv(mut self, csv: impl Into<String>) -> Self {
        self.csv = csv.into();
        self
    }

    /// Replaces the schema document.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Replaces the hyperparameter document.
    #[must_use]
    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }

    /// Writes an explicit `pipeline` list.
    #[must_use]
    pub fn with_stages(mut self, stages: &[StageKind]) -> Self {
        self.pipeline = Some(stages.to_vec());
        self
    }

    /// Points ingestion somewhere other than the fixture CSV.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Appends raw YAML lines (indented four spaces) to the transformation section.
    #[must_use]
    pub fn with_transformation_options(mut self, yaml: impl Into<String>) -> Self {
        self.transformation_options = yaml.into();
        self
    }

    /// Sets the evaluation tracking URI.
    #[must_use]
    pub fn with_tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.tracking_uri = uri.into();
        self
    }

    /// Returns the fixture directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the artifacts directory.
    #[must_use]
    pub fn artifacts_root(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// Returns the output directory of one stage.
    #[must_use]
    pub fn stage_dir(&self, kind: StageKind) -> PathBuf {
        self.artifacts_root().join(kind.as_str())
    }

    /// Writes every file and returns the document paths.
    pub fn write(&self) -> io::Result<ConfigPaths> {
        let paths = ConfigPaths::in_dir(&self.root);
        let source = self.root.join("data").join("raw.csv");

        std::fs::create_dir_all(self.root.join("config"))?;
        std::fs::create_dir_all(self.root.join("data"))?;
        std::fs::write(&source, &self.csv)?;
        std::fs::write(&paths.schema, &self.schema)?;
        std::fs::write(&paths.params, &self.params)?;
        std::fs::write(&paths.config, self.config_document(&source))?;

        Ok(paths)
    }

    fn config_document(&self, source: &Path) -> String {
        let dir = |kind: StageKind| quoted(&self.stage_dir(kind));
        let source_url = self
            .source_url
            .clone()
            .unwrap_or_else(|| source.display().to_string());

        let mut doc = format!("artifacts_root: {}\n", quoted(&self.artifacts_root()));
        if let Some(stages) = &self.pipeline {
            let names: Vec<&str> = stages.iter().map(StageKind::as_str).collect();
            let _ = writeln!(doc, "pipeline: [{}]", names.join(", "));
        }

        let ingestion = StageKind::DataIngestion;
        let validation = StageKind::DataValidation;
        let _ = write!(
            doc,
            "stages:
  data_ingestion:
    root_dir: {}
    source_url: '{source_url}'
    local_data_file: {}
  data_validation:
    root_dir: {}
    status_file: {}
  data_transformation:
    root_dir: {}
{}  model_trainer:
    root_dir: {}
    model_name: model.json
  model_evaluation:
    root_dir: {}
    metric_file_name: metrics.json
    tracking_uri: '{}'
",
            dir(ingestion),
            quoted(&self.stage_dir(ingestion).join("data.csv")),
            dir(validation),
            quoted(&self.stage_dir(validation).join("status.txt")),
            dir(StageKind::DataTransformation),
            self.transformation_options,
            dir(StageKind::ModelTrainer),
            dir(StageKind::ModelEvaluation),
            self.tracking_uri,
        );
        doc
    }
}

fn quoted(path: &Path) -> String {
    format!("'{}'", path.display())
}

/// Writes a default project with the given source data.
pub fn write_project(root: &Path, csv: &str) -> io::Result<ConfigPaths> {
    ProjectFixture::new(root).with_csv(csv).write()
}
