//! An MLflow tracking server client over its REST API.

use super::Tracker;
use crate::errors::TrackingReportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const SINK: &str = "mlflow";

/// Reports runs to an MLflow tracking server.
///
/// Credentials are read from `MLFLOW_TRACKING_USERNAME` and
/// `MLFLOW_TRACKING_PASSWORD` when set. Every request is bounded by the
/// timeout given at construction, so a server that stops answering surfaces
/// as a [`TrackingReportError`].
#[derive(Debug)]
pub struct MlflowTracker {
    base_url: String,
    client: reqwest::Client,
    credentials: Option<(String, String)>,
    // run id -> experiment id, needed for artifact upload paths
    runs: Mutex<HashMap<String, String>>,
}

impl MlflowTracker {
    /// Creates a client for the server at `base_url`.
    pub fn new(
        base_url: &str,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, TrackingReportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackingReportError::new(SINK, e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
            runs: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a client, taking credentials from the environment.
    pub fn from_env(base_url: &str, timeout: Duration) -> Result<Self, TrackingReportError> {
        let credentials = std::env::var("MLFLOW_TRACKING_USERNAME")
            .ok()
            .map(|user| {
                let password = std::env::var("MLFLOW_TRACKING_PASSWORD").unwrap_or_default();
                (user, password)
            });
        Self::new(base_url, credentials, timeout)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{endpoint}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, TrackingReportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TrackingReportError::new(SINK, e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TrackingReportError::new(SINK, e.to_string()))?;
        if !status.is_success() {
            return Err(TrackingReportError::new(
                SINK,
                format!("server returned {status}: {body}"),
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| TrackingReportError::new(SINK, e.to_string()))
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, TrackingReportError> {
        self.send(self.client.post(self.url(endpoint)).json(&body)).await
    }

    async fn experiment_id(&self, name: &str) -> Result<String, TrackingReportError> {
        let lookup = self
            .send(
                self.client
                    .get(self.url("experiments/get-by-name"))
                    .query(&[("experiment_name", name)]),
            )
            .await;

        if let Ok(found) = lookup {
            if let Some(id) = found["experiment"]["experiment_id"].as_str() {
                return Ok(id.to_string());
            }
        }

        let created = self.post("experiments/create", json!({ "name": name })).await?;
        created["experiment_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TrackingReportError::new(SINK, "experiment id missing from response"))
    }
}

#[async_trait]
impl Tracker for MlflowTracker {
    fn sink_name(&self) -> String {
        SINK.to_string()
    }

    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingReportError> {
        let experiment_id = self.experiment_id(experiment).await?;
        let created = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": crate::utils::unix_millis(),
                }),
            )
            .await?;
        let run_id = created["run"]["info"]["run_id"]
            .as_str()
            .ok_or_else(|| TrackingReportError::new(SINK, "run id missing from response"))?
            .to_string();

        debug!(run_id = %run_id, experiment_id = %experiment_id, "mlflow run created");
        self.runs.lock().insert(run_id.clone(), experiment_id);
        Ok(run_id)
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        let params: Vec<Value> = params
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        self.post("runs/log-batch", json!({ "run_id": run_id, "params": params }))
            .await
            .map(drop)
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        let timestamp = crate::utils::unix_millis();
        let metrics: Vec<Value> = metrics
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value, "timestamp": timestamp, "step": 0 }))
            .collect();
        self.post("runs/log-batch", json!({ "run_id": run_id, "metrics": metrics }))
            .await
            .map(drop)
    }

    async fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), TrackingReportError> {
        let experiment_id = self
            .runs
            .lock()
            .get(run_id)
            .cloned()
            .ok_or_else(|| TrackingReportError::new(SINK, format!("unknown run '{run_id}'")))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackingReportError::new(SINK, format!("{} is not a file", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TrackingReportError::new(SINK, e.to_string()))?;

        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{experiment_id}/{run_id}/artifacts/{file_name}",
            self.base_url
        );
        self.send(self.client.put(url).body(bytes)).await.map(drop)
    }

    async fn end_run(&self, run_id: &str) -> Result<(), TrackingReportError> {
        self.runs.lock().remove(run_id);
        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": "FINISHED",
                "end_time": crate::utils::unix_millis(),
            }),
        )
        .await
        .map(drop)
    }
}
