//! Core domain model types for mlpipeline.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kind and status enums
//! - Artifacts and their kinds

mod artifact;
mod status;

pub use artifact::{Artifact, ArtifactKind};
pub use status::{StageKind, StageStatus};
