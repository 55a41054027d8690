//! Trackers that need no server.

use super::Tracker;
use crate::errors::TrackingReportError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracker;

#[async_trait]
impl Tracker for NoOpTracker {
    fn sink_name(&self) -> String {
        "noop".to_string()
    }

    async fn start_run(&self, _experiment: &str, _run_name: &str) -> Result<String, TrackingReportError> {
        Ok(Uuid::new_v4().simple().to_string())
    }

    async fn log_params(
        &self,
        _run_id: &str,
        _params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        Ok(())
    }

    async fn log_metrics(
        &self,
        _run_id: &str,
        _metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        Ok(())
    }

    async fn log_artifact(&self, _run_id: &str, _path: &Path) -> Result<(), TrackingReportError> {
        Ok(())
    }

    async fn end_run(&self, _run_id: &str) -> Result<(), TrackingReportError> {
        Ok(())
    }
}

/// Writes every report to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracker;

#[async_trait]
impl Tracker for LoggingTracker {
    fn sink_name(&self) -> String {
        "logging".to_string()
    }

    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingReportError> {
        let run_id = Uuid::new_v4().simple().to_string();
        info!(experiment, run_name, run_id = %run_id, "tracking run started");
        Ok(run_id)
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        info!(run_id, ?params, "tracked params");
        Ok(())
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        info!(run_id, ?metrics, "tracked metrics");
        Ok(())
    }

    async fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), TrackingReportError> {
        info!(run_id, path = %path.display(), "tracked artifact");
        Ok(())
    }

    async fn end_run(&self, run_id: &str) -> Result<(), TrackingReportError> {
        info!(run_id, "tracking run ended");
        Ok(())
    }
}

/// Appends one JSON record per report to `<dir>/tracking.jsonl`.
///
/// Artifacts are copied to `<dir>/<run_id>/artifacts/`.
#[derive(Debug, Clone)]
pub struct JsonlTracker {
    dir: PathBuf,
}

impl JsonlTracker {
    /// Creates a tracker writing under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the record file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.dir.join("tracking.jsonl")
    }

    async fn append(&self, record: serde_json::Value) -> Result<(), TrackingReportError> {
        let fail = |e: std::io::Error| TrackingReportError::new("jsonl", e.to_string());

        tokio::fs::create_dir_all(&self.dir).await.map_err(fail)?;
        let mut line =
            serde_json::to_string(&record).map_err(|e| TrackingReportError::new("jsonl", e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file())
            .await
            .map_err(fail)?;
        file.write_all(line.as_bytes()).await.map_err(fail)?;
        file.flush().await.map_err(fail)
    }
}

#[async_trait]
impl Tracker for JsonlTracker {
    fn sink_name(&self) -> String {
        "jsonl".to_string()
    }

    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingReportError> {
        let run_id = Uuid::new_v4().simple().to_string();
        self.append(json!({
            "event": "run_started",
            "run_id": run_id,
            "experiment": experiment,
            "run_name": run_name,
            "timestamp": crate::utils::iso_timestamp(),
        }))
        .await?;
        Ok(run_id)
    }

    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError> {
        self.append(json!({ "event": "params", "run_id": run_id, "params": params }))
            .await
    }

    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError> {
        self.append(json!({ "event": "metrics", "run_id": run_id, "metrics": metrics }))
            .await
    }

    async fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), TrackingReportError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| TrackingReportError::new("jsonl", format!("{} is not a file", path.display())))?;
        let target_dir = self.dir.join(run_id).join("artifacts");
        let target = target_dir.join(file_name);

        let fail = |e: std::io::Error| TrackingReportError::new("jsonl", e.to_string());
        tokio::fs::create_dir_all(&target_dir).await.map_err(fail)?;
        tokio::fs::copy(path, &target).await.map_err(fail)?;

        self.append(json!({
            "event": "artifact",
            "run_id": run_id,
            "path": target.display().to_string(),
        }))
        .await
    }

    async fn end_run(&self, run_id: &str) -> Result<(), TrackingReportError> {
        self.append(json!({
            "event": "run_finished",
            "run_id": run_id,
            "timestamp": crate::utils::iso_timestamp(),
        }))
        .await
    }
}
