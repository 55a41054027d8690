//! The hyperparameter document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperparameters per model: model name → parameter name → value.
///
/// ```yaml
/// ElasticNet:
///   alpha: 0.2
///   l1_ratio: 0.1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparamSet(BTreeMap<String, BTreeMap<String, serde_json::Value>>);

impl HyperparamSet {
    /// Creates a set from a nested map.
    #[must_use]
    pub fn new(models: BTreeMap<String, BTreeMap<String, serde_json::Value>>) -> Self {
        Self(models)
    }

    /// Returns the parameters of one model.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.0.get(name)
    }

    /// Iterates over `(model, params)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, serde_json::Value>)> {
        self.0.iter().map(|(name, params)| (name.as_str(), params))
    }

    /// Returns the number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no models are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens one model's parameters into strings, for tracking sinks.
    #[must_use]
    pub fn flat_params(&self, model: &str) -> BTreeMap<String, String> {
        self.model(model)
            .map(|params| {
                params
                    .iter()
                    .map(|(key, value)| {
                        let rendered = match value {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key.clone(), rendered)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
