//! Utility functions for filesystem access and timestamps.

pub mod fs;
pub mod timestamps;

pub use fs::{create_directories, ensure_parent, load_json, read_yaml, save_json};
pub use timestamps::{iso_timestamp, unix_millis};
