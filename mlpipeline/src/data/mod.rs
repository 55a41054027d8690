//! Tabular data handling shared by the stages.

mod frame;

pub use frame::{Cell, DataFrame, FrameError};

use crate::errors::StageError;
use std::path::Path;

/// Reads a CSV file into a [`DataFrame`].
pub async fn read_csv(path: &Path) -> Result<DataFrame, StageError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StageError::io(path, e))?;
    DataFrame::from_csv_str(&text).map_err(|e| StageError::malformed(path, e))
}

/// Writes a [`DataFrame`] as CSV, creating the parent directory if needed.
pub async fn write_csv(path: &Path, frame: &DataFrame) -> Result<(), StageError> {
    crate::utils::ensure_parent(path).await?;
    tokio::fs::write(path, frame.to_csv_string())
        .await
        .map_err(|e| StageError::io(path, e))
}
