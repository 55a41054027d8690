//! Pipeline builder with validation.

use super::Orchestrator;
use crate::config::LoadedConfig;
use crate::core::StageKind;
use crate::entity::ConfigurationManager;
use crate::errors::{ConfigError, ContractErrorInfo, PipelineValidationError};
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::{build_stage, Stage};
use crate::tracking::Tracker;
use std::collections::HashSet;
use std::sync::Arc;

/// The pipeline name used when building from configuration.
pub const DEFAULT_PIPELINE_NAME: &str = "training_pipeline";

/// Builder for creating validated pipelines.
#[derive(Debug)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stages, in execution order.
    stages: Vec<Box<dyn Stage>>,
    /// Where lifecycle events go.
    event_sink: Arc<dyn EventSink>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            event_sink: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Builds the stages listed in a loaded configuration, in order.
    ///
    /// `tracker` overrides the evaluation stage's configured tracking URI.
    pub fn from_config(
        config: Arc<LoadedConfig>,
        tracker: Option<Arc<dyn Tracker>>,
    ) -> Result<Self, ConfigError> {
        let manager = ConfigurationManager::new(config);
        let kinds: Vec<StageKind> = manager
            .config()
            .pipeline()
            .stages()
            .iter()
            .map(|stage| stage.kind())
            .collect();

        let mut builder = Self::new(DEFAULT_PIPELINE_NAME);
        for kind in kinds {
            builder = builder.stage(build_stage(kind, &manager, tracker.clone())?);
        }
        Ok(builder)
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline is empty, lists a stage twice, or if
    /// a stage does not consume what the previous one produces.
    pub fn build(self) -> Result<Orchestrator, PipelineValidationError> {
        self.validate()?;
        Ok(Orchestrator::new(self.name, self.stages, self.event_sink))
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        let Some(first) = self.stages.first() else {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        };

        let mut seen = HashSet::new();
        for stage in &self.stages {
            let kind = stage.kind();
            if !seen.insert(kind) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{kind}' appears more than once"
                ))
                .with_stages(vec![kind])
                .with_error_info(
                    ContractErrorInfo::new("DUPLICATE", format!("Stage '{kind}' is listed twice"))
                        .with_fix_hint("Each stage runs at most once per pipeline; remove the repeat."),
                ));
            }
        }

        if let Some(input) = first.input_kind() {
            let kind = first.kind();
            return Err(PipelineValidationError::new(format!(
                "First stage '{kind}' needs a {input} artifact but nothing produces one"
            ))
            .with_stages(vec![kind])
            .with_error_info(
                ContractErrorInfo::new("CHAIN-HEAD", format!("'{kind}' cannot start a pipeline"))
                    .with_fix_hint("Start the pipeline with a stage that takes no input.")
                    .with_context_entry("expected_input", input.to_string()),
            ));
        }

        for pair in self.stages.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let produced = prev.output_kind();
            if next.input_kind() != Some(produced) {
                let expected = next
                    .input_kind()
                    .map_or_else(|| "none".to_string(), |k| k.to_string());
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' consumes {expected} but '{}' produces {produced}",
                    next.kind(),
                    prev.kind()
                ))
                .with_stages(vec![prev.kind(), next.kind()])
                .with_error_info(
                    ContractErrorInfo::new("CHAIN-BROKEN", "Artifact kinds do not line up")
                        .with_fix_hint("List the stages in canonical order without gaps.")
                        .with_context_entry("produced", produced.to_string())
                        .with_context_entry("expected", expected),
                ));
            }
        }

        Ok(())
    }
}
