//! Experiment tracking.
//!
//! The evaluation stage reports params, metrics and the metrics file to a
//! [`Tracker`]. Reporting is best effort: a [`TrackingReportError`] never
//! fails a pipeline.

mod local;
#[cfg(feature = "http")]
mod mlflow;

pub use local::{JsonlTracker, LoggingTracker, NoOpTracker};
#[cfg(feature = "http")]
pub use mlflow::MlflowTracker;

use crate::errors::{ConfigError, TrackingReportError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A sink for experiment runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tracker: Send + Sync + Debug {
    /// Returns a short name for log messages.
    fn sink_name(&self) -> String;

    /// Opens a run and returns the sink's identifier for it.
    async fn start_run(
        &self,
        experiment: &str,
        run_name: &str,
    ) -> Result<String, TrackingReportError>;

    /// Records hyperparameters.
    async fn log_params(
        &self,
        run_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), TrackingReportError>;

    /// Records metric values.
    async fn log_metrics(
        &self,
        run_id: &str,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<(), TrackingReportError>;

    /// Attaches a file to the run.
    async fn log_artifact(&self, run_id: &str, path: &Path) -> Result<(), TrackingReportError>;

    /// Closes the run.
    async fn end_run(&self, run_id: &str) -> Result<(), TrackingReportError>;
}

/// Picks a tracker for a tracking URI.
///
/// | URI                    | Tracker                                  |
/// |------------------------|------------------------------------------|
/// | absent or empty        | [`JsonlTracker`] in `<default_dir>/mlruns` |
/// | `none`                 | [`NoOpTracker`]                          |
/// | `log`                  | [`LoggingTracker`]                       |
/// | `file://<dir>`, a path | [`JsonlTracker`] in that directory       |
/// | `http://`, `https://`  | [`MlflowTracker`] (feature `http`)       |
///
/// `timeout` bounds each request to a remote server.
pub fn tracker_from_uri(
    uri: Option<&str>,
    default_dir: &Path,
    timeout: Duration,
) -> Result<Arc<dyn Tracker>, ConfigError> {
    let uri = uri.map(str::trim).unwrap_or_default();
    if uri.is_empty() {
        return Ok(Arc::new(JsonlTracker::new(default_dir.join("mlruns"))));
    }
    match uri {
        "none" => return Ok(Arc::new(NoOpTracker)),
        "log" => return Ok(Arc::new(LoggingTracker)),
        _ => {}
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return http_tracker(uri, timeout);
    }
    let dir = uri.strip_prefix("file://").unwrap_or(uri);
    Ok(Arc::new(JsonlTracker::new(dir)))
}

#[cfg(feature = "http")]
fn http_tracker(uri: &str, timeout: Duration) -> Result<Arc<dyn Tracker>, ConfigError> {
    let tracker = MlflowTracker::from_env(uri, timeout)
        .map_err(|e| ConfigError::invalid("model_evaluation", "tracking_uri", e.reason))?;
    Ok(Arc::new(tracker))
}

#[cfg(not(feature = "http"))]
fn http_tracker(_uri: &str, _timeout: Duration) -> Result<Arc<dyn Tracker>, ConfigError> {
    Err(ConfigError::invalid(
        "model_evaluation",
        "tracking_uri",
        "http tracking requires the `http` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn test_tracker_selection() {
        let base = Path::new("/tmp/eval");
        assert_eq!(tracker_from_uri(None, base, TIMEOUT).unwrap().sink_name(), "jsonl");
        assert_eq!(tracker_from_uri(Some("  "), base, TIMEOUT).unwrap().sink_name(), "jsonl");
        assert_eq!(tracker_from_uri(Some("none"), base, TIMEOUT).unwrap().sink_name(), "noop");
        assert_eq!(tracker_from_uri(Some("log"), base, TIMEOUT).unwrap().sink_name(), "logging");
        assert_eq!(
            tracker_from_uri(Some("file:///tmp/runs"), base, TIMEOUT)
                .unwrap()
                .sink_name(),
            "jsonl"
        );
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_uri_selects_mlflow() {
        let tracker = tracker_from_uri(Some("http://localhost:5000"), Path::new("."), TIMEOUT).unwrap();
        assert_eq!(tracker.sink_name(), "mlflow");
    }
}
