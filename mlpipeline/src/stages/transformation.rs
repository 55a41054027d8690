//! Deterministic feature engineering and the train/test split.

use super::{Stage, StageContext};
use crate::core::{Artifact, ArtifactKind, StageKind};
use crate::data::{read_csv, write_csv, Cell, DataFrame};
use crate::entity::{DataTransformationConfig, Scaling};
use crate::errors::{StageError, TransformationError};
use crate::utils::{create_directories, save_json};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// How a source column becomes a numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Numbers and booleans pass through.
    Numeric,
    /// Text is replaced by its index in the sorted category list.
    Ordinal {
        /// Sorted distinct values seen in the data.
        categories: Vec<String>,
    },
}

/// The fitted transform of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    /// The column name.
    pub name: String,
    /// How the column is encoded.
    pub encoding: Encoding,
    /// Replacement for nulls (training mean of the encoded values).
    pub fill_value: f64,
    /// Subtracted before scaling.
    pub offset: f64,
    /// Divisor after the offset is removed.
    pub scale: f64,
}

impl FeatureTransform {
    fn encode(&self, cell: &Cell) -> Option<f64> {
        match (&self.encoding, cell) {
            (_, Cell::Null) => None,
            (Encoding::Numeric, cell) => cell.as_f64(),
            (Encoding::Ordinal { categories }, cell) => {
                let value = cell.to_string();
                categories
                    .binary_search(&value)
                    .ok()
                    .and_then(|i| u32::try_from(i).ok())
                    .map(f64::from)
            }
        }
    }

    fn apply(&self, cell: &Cell) -> f64 {
        let raw = self.encode(cell).unwrap_or(self.fill_value);
        (raw - self.offset) / self.scale
    }
}

/// Everything needed to replay the transformation on new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    /// Feature transforms, in column order.
    pub features: Vec<FeatureTransform>,
    /// The column passed through untouched.
    pub target_column: Option<String>,
    /// The scaling that was fitted.
    pub scaling: Scaling,
    /// Seed of the split shuffle.
    pub seed: u64,
    /// Share of rows held out.
    pub test_ratio: f64,
}

/// The result of [`engineer_features`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredFeatures {
    /// Training rows.
    pub train: DataFrame,
    /// Held-out rows.
    pub test: DataFrame,
    /// The fitted transform.
    pub transform: FittedTransform,
}

/// Encodes, splits, imputes and scales a validated dataset.
///
/// A pure function of its inputs: the same frame and configuration always
/// produce the same output. Text columns are ordinal-encoded using their
/// sorted distinct values. Rows are shuffled with a seeded generator, the
/// first `round(n * test_ratio)` rows (at least one, at most `n - 1`) are
/// held out, and both splits keep the original row order. Nulls are filled
/// with the training mean, and the scaler is fitted on training rows only.
pub fn engineer_features(
    frame: &DataFrame,
    config: &DataTransformationConfig,
) -> Result<EngineeredFeatures, TransformationError> {
    let n = frame.row_count();
    if n < 2 {
        return Err(TransformationError::new(format!(
            "need at least 2 rows to split, found {n}"
        )));
    }

    let target_idx = match &config.target_column {
        Some(target) => Some(frame.column_index(target).ok_or_else(|| {
            TransformationError::new(format!("target column '{target}' not found"))
        })?),
        None => None,
    };
    if let Some(idx) = target_idx {
        if let Some(row) = frame.rows().iter().position(|r| r[idx].as_f64().is_none()) {
            return Err(TransformationError::new(format!(
                "target column has a non-numeric value at row {row}"
            )));
        }
    }

    let (train_rows, test_rows) = split_indices(n, config.test_ratio, config.seed);

    let mut features = Vec::new();
    let mut feature_idx = Vec::new();
    for (idx, name) in frame.columns().iter().enumerate() {
        if Some(idx) == target_idx {
            continue;
        }
        features.push(fit_feature(frame, idx, name, &train_rows, config.scaling));
        feature_idx.push(idx);
    }
    if features.is_empty() {
        return Err(TransformationError::new("no feature columns left after removing the target"));
    }

    let build = |rows: &[usize]| -> Result<DataFrame, TransformationError> {
        let mut columns: Vec<String> = features.iter().map(|f| f.name.clone()).collect();
        if let Some(idx) = target_idx {
            columns.push(frame.columns()[idx].clone());
        }
        let data = rows
            .iter()
            .map(|&r| {
                let source = &frame.rows()[r];
                let mut out: Vec<Cell> = features
                    .iter()
                    .zip(&feature_idx)
                    .map(|(f, &i)| Cell::Float(f.apply(&source[i])))
                    .collect();
                if let Some(idx) = target_idx {
                    out.push(source[idx].clone());
                }
                out
            })
            .collect();
        DataFrame::new(columns, data).map_err(|e| TransformationError::new(e.to_string()))
    };

    let train = build(&train_rows)?;
    let test = build(&test_rows)?;
    debug!(train = train.row_count(), test = test.row_count(), "split done");

    Ok(EngineeredFeatures {
        train,
        test,
        transform: FittedTransform {
            features,
            target_column: config.target_column.clone(),
            scaling: config.scaling,
            seed: config.seed,
            test_ratio: config.test_ratio,
        },
    })
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn split_indices(n: usize, ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let test_count = ((n as f64 * ratio).round() as usize).clamp(1, n - 1);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut test = order[..test_count].to_vec();
    let mut train = order[test_count..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    (train, test)
}

#[allow(clippy::cast_precision_loss)]
fn fit_feature(
    frame: &DataFrame,
    idx: usize,
    name: &str,
    train_rows: &[usize],
    scaling: Scaling,
) -> FeatureTransform {
    let is_text = frame
        .rows()
        .iter()
        .any(|r| matches!(r[idx], Cell::Str(_)));
    let encoding = if is_text {
        let categories: BTreeSet<String> = frame
            .rows()
            .iter()
            .map(|r| &r[idx])
            .filter(|c| !c.is_null())
            .map(ToString::to_string)
            .collect();
        Encoding::Ordinal {
            categories: categories.into_iter().collect(),
        }
    } else {
        Encoding::Numeric
    };

    let mut transform = FeatureTransform {
        name: name.to_string(),
        encoding,
        fill_value: 0.0,
        offset: 0.0,
        scale: 1.0,
    };

    let observed: Vec<f64> = train_rows
        .iter()
        .filter_map(|&r| transform.encode(&frame.rows()[r][idx]))
        .collect();
    if !observed.is_empty() {
        transform.fill_value = observed.iter().sum::<f64>() / observed.len() as f64;
    }

    let filled: Vec<f64> = train_rows
        .iter()
        .map(|&r| {
            transform
                .encode(&frame.rows()[r][idx])
                .unwrap_or(transform.fill_value)
        })
        .collect();

    match scaling {
        Scaling::Standard => {
            let mean = filled.iter().sum::<f64>() / filled.len() as f64;
            let variance =
                filled.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / filled.len() as f64;
            let std = variance.sqrt();
            transform.offset = mean;
            transform.scale = if std > 0.0 { std } else { 1.0 };
        }
        Scaling::MinMax => {
            let min = filled.iter().copied().fold(f64::INFINITY, f64::min);
            let max = filled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            transform.offset = min;
            transform.scale = if max > min { max - min } else { 1.0 };
        }
        Scaling::None => {}
    }

    transform
}

/// Runs [`engineer_features`] on the validated data and writes the splits.
#[derive(Debug, Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for DataTransformation {
    fn kind(&self) -> StageKind {
        StageKind::DataTransformation
    }

    #[instrument(skip_all, fields(scaling = %self.config.scaling, seed = self.config.seed))]
    async fn run(&self, ctx: &StageContext<'_>) -> Result<Artifact, StageError> {
        let input = ctx.input(ArtifactKind::ValidatedData)?;
        let frame = read_csv(input.file("data")?).await?;
        let engineered = engineer_features(&frame, &self.config)?;

        let root = &self.config.root_dir;
        create_directories(&[root]).await?;
        let train_file = root.join("train.csv");
        let test_file = root.join("test.csv");
        let transform_file = root.join("transform.json");
        write_csv(&train_file, &engineered.train).await?;
        write_csv(&test_file, &engineered.test).await?;
        save_json(&transform_file, &engineered.transform).await?;

        info!(
            train_rows = engineered.train.row_count(),
            test_rows = engineered.test.row_count(),
            features = engineered.transform.features.len(),
            "features engineered"
        );

        Ok(
            Artifact::new(ArtifactKind::FeatureSet, StageKind::DataTransformation)
                .with_file("train", train_file)
                .with_file("test", test_file)
                .with_file("transform", transform_file)
                .with_payload(json!({
                    "train_rows": engineered.train.row_count(),
                    "test_rows": engineered.test.row_count(),
                    "features": engineered
                        .transform
                        .features
                        .iter()
                        .map(|f| f.name.as_str())
                        .collect::<Vec<_>>(),
                })),
        )
    }
}
