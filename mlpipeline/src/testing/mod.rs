//! Testing utilities for mlpipeline.
//!
//! This module provides:
//! - Project fixtures that write a complete configuration to disk
//! - Mock stages and trackers

mod fixtures;
mod mocks;

pub use fixtures::{sample_csv, write_project, ProjectFixture};
pub use mocks::{CallLog, CollectingTracker, FailingTracker, MockStage, TrackedEvent};
