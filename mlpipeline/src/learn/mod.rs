//! The built-in learning backend: linear models and regression metrics.

mod linear;
mod metrics;

pub use linear::{CoordinateDescentParams, Estimator, FittedModel, ModelFamily, ModelSpec};
pub use metrics::RegressionMetrics;

use thiserror::Error;

/// Errors raised while fitting or scoring a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LearnError {
    /// No rows to fit or score.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Shapes do not line up.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// NaN or infinity where finite numbers are required.
    #[error("non-finite values in {what}")]
    NonFinite {
        /// What contained the value.
        what: &'static str,
    },

    /// The model name maps to no known family.
    #[error("unknown model '{name}'")]
    UnknownModel {
        /// The name from the hyperparameter document.
        name: String,
    },

    /// A hyperparameter is out of range or not applicable.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl LearnError {
    pub(crate) fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
