//! Pipeline building and execution.
//!
//! This module provides:
//! - The pipeline builder, which checks that stages form an artifact chain
//! - The orchestrator, which runs the chain sequentially
//! - Run state and per-stage records

mod builder;
mod orchestrator;
mod state;

pub use builder::{PipelineBuilder, DEFAULT_PIPELINE_NAME};
pub use orchestrator::Orchestrator;
pub use state::{PipelineRun, PipelineState, StageRecord};

use crate::config::{ConfigPaths, ConfigStore};
use crate::errors::PipelineError;
use crate::events::EventSink;
use crate::tracking::Tracker;
use std::sync::Arc;

/// Loads the configuration documents and assembles the orchestrator.
///
/// Nothing runs if this fails.
pub fn load_orchestrator(
    paths: &ConfigPaths,
    tracker: Option<Arc<dyn Tracker>>,
    event_sink: Option<Arc<dyn EventSink>>,
) -> Result<Orchestrator, PipelineError> {
    let config = Arc::new(ConfigStore::load(paths)?);
    let mut builder = PipelineBuilder::from_config(config, tracker)?;
    if let Some(sink) = event_sink {
        builder = builder.with_event_sink(sink);
    }
    Ok(builder.build()?)
}
