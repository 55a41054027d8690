//! Event sink trait and implementations.

use super::PipelineEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt::Debug;
use tracing::{debug, info, Level};

/// Trait for sinks that receive pipeline lifecycle events.
///
/// Emitting never fails: a sink that cannot deliver an event logs the
/// problem and drops it.
#[async_trait]
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event` - The lifecycle event
    /// * `data` - Event fields such as the pipeline name, stage and duration
    async fn emit(&self, event: PipelineEvent, data: serde_json::Value);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PipelineEvent, _data: serde_json::Value) {}
}

/// An event sink that logs events using the tracing framework.
///
/// This is the sink a pipeline uses unless another one is configured.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PipelineEvent, data: serde_json::Value) {
        if self.level == Level::DEBUG {
            debug!(event_type = %event, event_data = %data, "event: {event}");
        } else {
            info!(event_type = %event, event_data = %data, "event: {event}");
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(PipelineEvent, serde_json::Value)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(PipelineEvent, serde_json::Value)> {
        self.events.read().clone()
    }

    /// Returns the collected event names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|(e, _)| e.as_str()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events whose name starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(PipelineEvent, serde_json::Value)> {
        self.events
            .read()
            .iter()
            .filter(|(e, _)| e.as_str().starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent, data: serde_json::Value) {
        self.events.write().push((event, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks() {
        NoOpEventSink.emit(PipelineEvent::PipelineStarted, json!({})).await;
        LoggingEventSink::default()
            .emit(PipelineEvent::StageStarted, json!({"stage": "data_ingestion"}))
            .await;
        LoggingEventSink::debug()
            .emit(PipelineEvent::StageCompleted, json!(null))
            .await;
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(PipelineEvent::PipelineStarted, json!({})).await;
        sink.emit(PipelineEvent::StageStarted, json!({"stage": "data_ingestion"}))
            .await;

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.names(), vec!["pipeline.started", "stage.started"]);
        assert_eq!(sink.events()[1].1["stage"], "data_ingestion");
    }

    #[tokio::test]
    async fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        sink.emit(PipelineEvent::StageStarted, json!({})).await;
        sink.emit(PipelineEvent::StageFailed, json!({})).await;
        sink.emit(PipelineEvent::PipelineFailed, json!({})).await;

        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_of_type("pipeline.").len(), 1);
    }
}
