//! Checking the raw data against the schema.

use super::{Stage, StageContext};
use crate::config::{ColumnType, SchemaSpec};
use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::data::{read_csv, Cell, DataFrame};
use crate::entity::DataValidationConfig;
use crate::errors::{SchemaViolation, SchemaViolationError, StageError};
use crate::utils::{create_directories, ensure_parent, save_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// The outcome of validating one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no violation was found.
    pub status: bool,
    /// Number of data rows checked.
    pub rows: usize,
    /// Every violation, in discovery order.
    pub violations: Vec<SchemaViolation>,
}

/// Checks a frame against a schema and returns every violation.
///
/// Column presence is checked first, then each declared column that is
/// present, cell by cell.
#[must_use]
pub fn validate_frame(frame: &DataFrame, schema: &SchemaSpec) -> Vec<SchemaViolation> {
    let mut violations: Vec<SchemaViolation> = schema
        .columns()
        .keys()
        .filter(|name| frame.column_index(name).is_none())
        .map(|name| SchemaViolation::MissingColumn {
            column: name.clone(),
        })
        .collect();

    violations.extend(
        frame
            .columns()
            .iter()
            .filter(|name| schema.column(name).is_none())
            .map(|name| SchemaViolation::UnexpectedColumn {
                column: name.clone(),
            }),
    );

    for (idx, name) in frame.columns().iter().enumerate() {
        let Some(spec) = schema.column(name) else {
            continue;
        };
        for (row, cells) in frame.rows().iter().enumerate() {
            let cell = &cells[idx];
            if cell.is_null() {
                if !spec.nullable {
                    violations.push(SchemaViolation::NullValue {
                        column: name.clone(),
                        row,
                    });
                }
            } else if !accepts(spec.dtype, cell) {
                violations.push(SchemaViolation::TypeMismatch {
                    column: name.clone(),
                    row,
                    expected: spec.dtype,
                    found: cell.type_name().to_string(),
                });
            }
        }
    }

    violations
}

fn accepts(dtype: ColumnType, cell: &Cell) -> bool {
    match dtype {
        ColumnType::Int => matches!(cell, Cell::Int(_)),
        ColumnType::Float => matches!(cell, Cell::Int(_) | Cell::Float(_)),
        ColumnType::Bool => matches!(cell, Cell::Bool(_)),
        ColumnType::String => true,
    }
}

/// Validates the ingested data and writes the report and status file.
#[derive(Debug, Clone)]
pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for DataValidation {
    fn kind(&self) -> StageKind {
        StageKind::DataValidation
    }

    #[instrument(skip_all)]
    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        let input = ctx.input(ArtifactKind::RawData)?;
        let data = input.file("data")?;
        create_directories(&[&self.config.root_dir]).await?;

        let frame = read_csv(data).await?;
        let violations = validate_frame(&frame, &self.config.schema);
        let report = ValidationReport {
            status: violations.is_empty(),
            rows: frame.row_count(),
            violations,
        };

        let report_file = self.config.root_dir.join("report.json");
        save_json(&report_file, &report).await?;

        let status_file = &self.config.status_file;
        ensure_parent(status_file).await?;
        tokio::fs::write(status_file, format!("Validation status: {}", report.status))
            .await
            .map_err(|e| StageError::io(status_file, e))?;

        if !report.status {
            warn!(
                violations = report.violations.len(),
                "data does not match the schema"
            );
            return Err(SchemaViolationError::new(report.violations).into());
        }

        info!(rows = report.rows, "data matches the schema");
        Ok(Artifact::new(ArtifactKind::ValidatedData, StageKind::DataValidation)
            .with_file("data", data)
            .with_file("report", report_file)
            .with_payload(serde_json::to_value(&report)?))
    }
}
