//! The config store.
//!
//! Three declarative YAML documents drive a run:
//!
//! - `config/config.yaml`: artifacts root, stage order and one section per stage
//! - `schema.yaml`: expected columns and the target column
//! - `params.yaml`: hyperparameters per model
//!
//! [`ConfigStore::load`] reads and validates all three into a
//! [`LoadedConfig`], which is never mutated afterwards.

mod params;
mod pipeline;
mod schema;
mod store;

pub use params::HyperparamSet;
pub use pipeline::{PipelineConfig, StageConfig};
pub use schema::{ColumnSpec, ColumnType, SchemaSpec};
pub use store::{ConfigPaths, ConfigStore, LoadedConfig};
