//! Regression metrics.

use super::LearnError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scores of one model on held-out data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination.
    pub r2: f64,
}

impl RegressionMetrics {
    /// Computes all metrics.
    ///
    /// When the truth is constant, `r2` is 1 for exact predictions and 0
    /// otherwise, so it is always finite.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self, LearnError> {
        if y_true.is_empty() {
            return Err(LearnError::EmptyDataset);
        }
        if y_true.len() != y_pred.len() {
            return Err(LearnError::DimensionMismatch {
                expected: y_true.len(),
                found: y_pred.len(),
            });
        }
        if y_true.iter().chain(y_pred).any(|v| !v.is_finite()) {
            return Err(LearnError::NonFinite { what: "predictions" });
        }

        let n = y_true.len() as f64;
        let mean = y_true.iter().sum::<f64>() / n;
        let (mut sse, mut sae, mut sst) = (0.0, 0.0, 0.0);
        for (t, p) in y_true.iter().zip(y_pred) {
            let err = t - p;
            sse += err * err;
            sae += err.abs();
            sst += (t - mean) * (t - mean);
        }

        let r2 = if sst > 0.0 {
            1.0 - sse / sst
        } else if sse <= 0.0 {
            1.0
        } else {
            0.0
        };
        Ok(Self {
            rmse: (sse / n).sqrt(),
            mae: sae / n,
            r2,
        })
    }

    /// Returns the metrics keyed by name, as logged to the tracker.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("mae".to_string(), self.mae),
            ("r2".to_string(), self.r2),
            ("rmse".to_string(), self.rmse),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert!((m.r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_values() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0, 4.0], &[2.0, 2.0, 3.0, 2.0]).unwrap();
        // errors: -1, 0, 0, 2
        assert!((m.mae - 0.75).abs() < 1e-12);
        assert!((m.rmse - (5.0_f64 / 4.0).sqrt()).abs() < 1e-12);
        // sst = 5
        assert!((m.r2 - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_truth() {
        let m = RegressionMetrics::compute(&[2.0, 2.0], &[1.0, 3.0]).unwrap();
        assert_eq!(m.r2, 0.0);
        assert!((m.mae - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_truth_exact_predictions() {
        let m = RegressionMetrics::compute(&[2.0, 2.0, 2.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            RegressionMetrics::compute(&[], &[]),
            Err(LearnError::EmptyDataset)
        ));
        assert!(matches!(
            RegressionMetrics::compute(&[1.0], &[1.0, 2.0]),
            Err(LearnError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            RegressionMetrics::compute(&[1.0], &[f64::INFINITY]),
            Err(LearnError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_map_keys() {
        let m = RegressionMetrics::compute(&[1.0, 2.0], &[1.0, 2.5]).unwrap();
        let map = m.to_map();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["mae", "r2", "rmse"]);
    }
}
