//! Penalised linear regression fitted by coordinate descent.

use super::LearnError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The linear model families the trainer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Mixed L1/L2 penalty.
    ElasticNet,
    /// L1 penalty only.
    Lasso,
    /// L2 penalty only.
    Ridge,
    /// Ordinary least squares.
    LinearRegression,
}

impl ModelFamily {
    /// Resolves a model name from the hyperparameter document.
    ///
    /// Matching ignores case, underscores, dashes and spaces, so
    /// `ElasticNet`, `elastic_net` and `elastic-net` are the same model.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "elasticnet" => Some(Self::ElasticNet),
            "lasso" => Some(Self::Lasso),
            "ridge" => Some(Self::Ridge),
            "linearregression" | "ols" => Some(Self::LinearRegression),
            _ => None,
        }
    }

    fn default_params(self) -> CoordinateDescentParams {
        let (alpha, l1_ratio) = match self {
            Self::ElasticNet => (1.0, 0.5),
            Self::Lasso => (1.0, 1.0),
            Self::Ridge => (1.0, 0.0),
            Self::LinearRegression => (0.0, 0.0),
        };
        CoordinateDescentParams {
            alpha,
            l1_ratio,
            ..CoordinateDescentParams::default()
        }
    }

    fn accepts(self, key: &str) -> bool {
        match key {
            "max_iter" | "tol" | "fit_intercept" => true,
            "alpha" => self != Self::LinearRegression,
            "l1_ratio" => self == Self::ElasticNet,
            _ => false,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElasticNet => write!(f, "elastic_net"),
            Self::Lasso => write!(f, "lasso"),
            Self::Ridge => write!(f, "ridge"),
            Self::LinearRegression => write!(f, "linear_regression"),
        }
    }
}

/// Solver settings.
///
/// The objective is `1/(2n) * ||y - Xw - b||² + alpha * l1_ratio * ||w||₁
/// + alpha * (1 - l1_ratio) / 2 * ||w||²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateDescentParams {
    /// Overall penalty strength.
    pub alpha: f64,
    /// Share of the penalty that is L1.
    pub l1_ratio: f64,
    /// Maximum number of full passes over the coefficients.
    pub max_iter: usize,
    /// Convergence threshold on the relative coefficient change.
    pub tol: f64,
    /// Whether to fit an intercept.
    pub fit_intercept: bool,
}

impl Default for CoordinateDescentParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-4,
            fit_intercept: true,
        }
    }
}

impl CoordinateDescentParams {
    fn validate(&self) -> Result<(), LearnError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(LearnError::invalid_param("alpha", "must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(LearnError::invalid_param("l1_ratio", "must be between 0 and 1"));
        }
        if self.max_iter == 0 {
            return Err(LearnError::invalid_param("max_iter", "must be at least 1"));
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(LearnError::invalid_param("tol", "must be a positive number"));
        }
        Ok(())
    }
}

/// A named model with resolved solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// The name as written in the hyperparameter document.
    pub name: String,
    /// The resolved model family.
    pub family: ModelFamily,
    /// Solver settings after applying the family's defaults.
    pub params: CoordinateDescentParams,
}

impl ModelSpec {
    /// Builds a model from its hyperparameter entry.
    ///
    /// Unknown keys, and keys that make no sense for the family (such as
    /// `l1_ratio` on `Ridge`), are rejected.
    pub fn from_hyperparams(
        name: &str,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, LearnError> {
        let family = ModelFamily::from_name(name).ok_or_else(|| LearnError::UnknownModel {
            name: name.to_string(),
        })?;
        let mut resolved = family.default_params();

        for (key, value) in params {
            if !family.accepts(key) {
                return Err(LearnError::invalid_param(
                    key,
                    format!("not a parameter of {family}"),
                ));
            }
            match key.as_str() {
                "alpha" => resolved.alpha = number(key, value)?,
                "l1_ratio" => resolved.l1_ratio = number(key, value)?,
                "tol" => resolved.tol = number(key, value)?,
                "max_iter" => {
                    resolved.max_iter = value
                        .as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| {
                            LearnError::invalid_param(key, "must be a positive integer")
                        })?;
                }
                "fit_intercept" => {
                    resolved.fit_intercept = value
                        .as_bool()
                        .ok_or_else(|| LearnError::invalid_param(key, "must be true or false"))?;
                }
                _ => {}
            }
        }

        resolved.validate()?;
        Ok(Self {
            name: name.to_string(),
            family,
            params: resolved,
        })
    }
}

fn number(key: &str, value: &serde_json::Value) -> Result<f64, LearnError> {
    value
        .as_f64()
        .ok_or_else(|| LearnError::invalid_param(key, format!("expected a number, found {value}")))
}

/// Something that can be fitted to a design matrix.
pub trait Estimator {
    /// Returns the model name.
    fn name(&self) -> &str;

    /// Fits the model. `x` is row-major; every row must have one value per
    /// entry of `feature_names`.
    fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
    ) -> Result<FittedModel, LearnError>;
}

impl Estimator for ModelSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
    ) -> Result<FittedModel, LearnError> {
        check_design(x, y, feature_names.len())?;
        let solution = coordinate_descent(x, y, &self.params)?;
        Ok(FittedModel {
            name: self.name.clone(),
            family: self.family,
            params: self.params,
            feature_names: feature_names.to_vec(),
            intercept: solution.intercept,
            coefficients: solution.coefficients,
            iterations: solution.iterations,
            converged: solution.converged,
        })
    }
}

/// A fitted linear model, as persisted by the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    /// The model name.
    pub name: String,
    /// The model family.
    pub family: ModelFamily,
    /// The solver settings used.
    pub params: CoordinateDescentParams,
    /// Feature columns, in coefficient order.
    pub feature_names: Vec<String>,
    /// The intercept term.
    pub intercept: f64,
    /// One coefficient per feature.
    pub coefficients: Vec<f64>,
    /// Passes the solver made.
    pub iterations: usize,
    /// Whether the solver met its tolerance before `max_iter`.
    pub converged: bool,
}

impl FittedModel {
    /// Predicts one row.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, LearnError> {
        if row.len() != self.coefficients.len() {
            return Err(LearnError::DimensionMismatch {
                expected: self.coefficients.len(),
                found: row.len(),
            });
        }
        Ok(self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>())
    }

    /// Predicts every row of a matrix.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, LearnError> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

fn check_design(x: &[Vec<f64>], y: &[f64], features: usize) -> Result<(), LearnError> {
    if x.is_empty() {
        return Err(LearnError::EmptyDataset);
    }
    if y.len() != x.len() {
        return Err(LearnError::DimensionMismatch {
            expected: x.len(),
            found: y.len(),
        });
    }
    if let Some(row) = x.iter().find(|row| row.len() != features) {
        return Err(LearnError::DimensionMismatch {
            expected: features,
            found: row.len(),
        });
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(LearnError::NonFinite { what: "training data" });
    }
    Ok(())
}

struct Solution {
    intercept: f64,
    coefficients: Vec<f64>,
    iterations: usize,
    converged: bool,
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss, clippy::needless_range_loop)]
fn coordinate_descent(
    x: &[Vec<f64>],
    y: &[f64],
    params: &CoordinateDescentParams,
) -> Result<Solution, LearnError> {
    let n = x.len();
    let d = x.first().map_or(0, Vec::len);
    let nf = n as f64;

    let (x_mean, y_mean) = if params.fit_intercept {
        let x_mean: Vec<f64> = (0..d)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / nf)
            .collect();
        (x_mean, y.iter().sum::<f64>() / nf)
    } else {
        (vec![0.0; d], 0.0)
    };

    // Column-major, centred.
    let cols: Vec<Vec<f64>> = (0..d)
        .map(|j| x.iter().map(|row| row[j] - x_mean[j]).collect())
        .collect();
    let norms: Vec<f64> = cols
        .iter()
        .map(|c| c.iter().map(|v| v * v).sum::<f64>() / nf)
        .collect();

    let l1 = params.alpha * params.l1_ratio;
    let l2 = params.alpha * (1.0 - params.l1_ratio);

    let mut w = vec![0.0; d];
    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let mut iterations = 0;
    let mut converged = d == 0;

    while !converged && iterations < params.max_iter {
        iterations += 1;
        let mut max_delta = 0.0_f64;
        let mut max_weight = 0.0_f64;

        for j in 0..d {
            let denom = norms[j] + l2;
            if denom <= 0.0 {
                continue;
            }
            let old = w[j];
            let rho = cols[j]
                .iter()
                .zip(&residual)
                .map(|(xij, r)| xij * r)
                .sum::<f64>()
                / nf
                + norms[j] * old;
            let new = soft_threshold(rho, l1) / denom;
            let delta = new - old;
            if delta != 0.0 {
                for (r, xij) in residual.iter_mut().zip(&cols[j]) {
                    *r -= xij * delta;
                }
                w[j] = new;
            }
            max_delta = max_delta.max(delta.abs());
            max_weight = max_weight.max(new.abs());
        }

        if w.iter().any(|v| !v.is_finite()) {
            return Err(LearnError::NonFinite { what: "coefficients" });
        }
        converged = max_weight == 0.0 || max_delta / max_weight < params.tol;
    }

    let intercept = y_mean - x_mean.iter().zip(&w).map(|(m, c)| m * c).sum::<f64>();
    Ok(Solution {
        intercept,
        coefficients: w,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 3 + 2*a - b
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![f64::from(i), f64::from((i * 7) % 5)])
            .collect();
        let y = x.iter().map(|r| 3.0 + 2.0 * r[0] - r[1]).collect();
        (x, y)
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_family_names() {
        assert_eq!(ModelFamily::from_name("ElasticNet"), Some(ModelFamily::ElasticNet));
        assert_eq!(ModelFamily::from_name("elastic_net"), Some(ModelFamily::ElasticNet));
        assert_eq!(
            ModelFamily::from_name("Linear-Regression"),
            Some(ModelFamily::LinearRegression)
        );
        assert_eq!(ModelFamily::from_name("RandomForest"), None);
    }

    #[test]
    fn test_spec_applies_family_defaults() {
        let spec = ModelSpec::from_hyperparams("Lasso", &params(&[("alpha", json!(0.1))])).unwrap();
        assert_eq!(spec.family, ModelFamily::Lasso);
        assert!((spec.params.alpha - 0.1).abs() < f64::EPSILON);
        assert!((spec.params.l1_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spec_rejects_bad_params() {
        let err = ModelSpec::from_hyperparams("Ridge", &params(&[("l1_ratio", json!(0.3))]))
            .unwrap_err();
        assert!(matches!(err, LearnError::InvalidParam { ref name, .. } if name == "l1_ratio"));

        let err = ModelSpec::from_hyperparams("ElasticNet", &params(&[("alpha", json!(-1))]))
            .unwrap_err();
        assert!(matches!(err, LearnError::InvalidParam { ref name, .. } if name == "alpha"));

        let err = ModelSpec::from_hyperparams("ElasticNet", &params(&[("solver", json!("x"))]))
            .unwrap_err();
        assert!(matches!(err, LearnError::InvalidParam { .. }));

        let err = ModelSpec::from_hyperparams("Xgb", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, LearnError::UnknownModel { .. }));
    }

    #[test]
    fn test_ols_recovers_exact_coefficients() {
        let (x, y) = linear_data();
        let spec = ModelSpec::from_hyperparams(
            "LinearRegression",
            &params(&[("tol", json!(1e-10)), ("max_iter", json!(10_000))]),
        )
        .unwrap();
        let model = spec.fit(&x, &y, &names()).unwrap();

        assert!(model.converged);
        assert!((model.intercept - 3.0).abs() < 1e-4, "{}", model.intercept);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-4);
        assert!((model.coefficients[1] + 1.0).abs() < 1e-4);
        assert!((model.predict_row(&[10.0, 2.0]).unwrap() - 21.0).abs() < 1e-3);
    }

    #[test]
    fn test_strong_lasso_zeroes_coefficients() {
        let (x, y) = linear_data();
        let spec = ModelSpec::from_hyperparams("Lasso", &params(&[("alpha", json!(1000.0))]))
            .unwrap();
        let model = spec.fit(&x, &y, &names()).unwrap();

        assert_eq!(model.coefficients, vec![0.0, 0.0]);
        let mean = y.iter().sum::<f64>() / 20.0;
        assert!((model.intercept - mean).abs() < 1e-9);
    }

    #[test]
    fn test_ridge_shrinks_toward_zero() {
        let (x, y) = linear_data();
        let ols = ModelSpec::from_hyperparams("LinearRegression", &BTreeMap::new())
            .unwrap()
            .fit(&x, &y, &names())
            .unwrap();
        let ridge = ModelSpec::from_hyperparams("Ridge", &params(&[("alpha", json!(10.0))]))
            .unwrap()
            .fit(&x, &y, &names())
            .unwrap();

        assert!(ridge.coefficients[0].abs() < ols.coefficients[0].abs());
    }

    #[test]
    fn test_constant_feature_is_ignored() {
        let x = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let y = vec![2.0, 4.0, 6.0];
        let model = ModelSpec::from_hyperparams("LinearRegression", &BTreeMap::new())
            .unwrap()
            .fit(&x, &y, &names())
            .unwrap();
        assert_eq!(model.coefficients[1], 0.0);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let spec = ModelSpec::from_hyperparams("ElasticNet", &BTreeMap::new()).unwrap();
        assert!(matches!(
            spec.fit(&[], &[], &names()),
            Err(LearnError::EmptyDataset)
        ));
        assert!(matches!(
            spec.fit(&[vec![1.0]], &[1.0], &names()),
            Err(LearnError::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            spec.fit(&[vec![1.0, f64::NAN]], &[1.0], &names()),
            Err(LearnError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_fitted_model_serializes() {
        let (x, y) = linear_data();
        let model = ModelSpec::from_hyperparams("ElasticNet", &BTreeMap::new())
            .unwrap()
            .fit(&x, &y, &names())
            .unwrap();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["family"], "elastic_net");
        assert_eq!(json["feature_names"], json!(["a", "b"]));
        let back: FittedModel = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, model.name);
        assert_eq!(back.coefficients.len(), 2);
    }
}
