//! # mlpipeline
//!
//! A configuration-driven machine learning training pipeline.
//!
//! Three YAML documents (pipeline settings, data schema, hyperparameters)
//! describe a run. The crate provides:
//!
//! - **Config store**: loads and validates the documents once, up front
//! - **Stages**: ingestion, validation, transformation, training and
//!   evaluation behind one [`stages::Stage`] trait
//! - **Orchestrator**: runs the stages strictly in order, passing each
//!   stage's artifact to the next and stopping at the first failure
//! - **Experiment tracking**: best-effort reporting of params and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mlpipeline::prelude::*;
//!
//! let orchestrator = load_orchestrator(&ConfigPaths::in_dir("."), None, None)?;
//! let run = orchestrator.run().await;
//! match run.state() {
//!     PipelineState::Completed => println!("done"),
//!     PipelineState::Failed(failure) => eprintln!("{failure}"),
//!     _ => unreachable!(),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod core;
pub mod data;
pub mod entity;
pub mod errors;
pub mod events;
pub mod learn;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod tracking;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ConfigPaths, ConfigStore, HyperparamSet, LoadedConfig, SchemaSpec, StageConfig,
    };
    pub use crate::core::{Artifact, ArtifactKind, StageKind, StageStatus};
    pub use crate::entity::ConfigurationManager;
    pub use crate::errors::{
        ConfigError, PipelineError, PipelineValidationError, StageError, StageFailure,
        TrackingReportError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::pipeline::{
        load_orchestrator, Orchestrator, PipelineBuilder, PipelineRun, PipelineState,
    };
    pub use crate::stages::{build_stage, Stage, StageContext};
    pub use crate::tracking::{tracker_from_uri, Tracker};
}
