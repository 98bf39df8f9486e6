//! Observation sinks.
//!
//! Components that recover from failures locally (the repository context
//! fetcher in particular) report what happened through an [`EventSink`]
//! instead of returning an error, so the outcome stays observable.

use parking_lot::RwLock;
use serde_json::Value;
use tracing::Level;

/// Receives named observations with structured data.
///
/// Implementations must not block and must never panic.
pub trait EventSink: Send + Sync {
    /// Records one observation, e.g. `repo_context.document_fallback`.
    fn emit(&self, event_type: &str, data: Value);
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: Value) {}
}

/// Writes observations to the tracing subscriber.
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
    /// Creates a logging sink at `level`.
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

impl EventSink for LoggingEventSink {
    fn emit(&self, event_type: &str, data: Value) {
        // Fallbacks are worth a warning regardless of the configured level.
        if event_type.ends_with("fallback") {
            tracing::warn!(event_type, data = %data, "{event_type}");
            return;
        }
        match self.level {
            Level::TRACE | Level::DEBUG => tracing::debug!(event_type, data = %data, "{event_type}"),
            _ => tracing::info!(event_type, data = %data, "{event_type}"),
        }
    }
}

/// Keeps every observation in memory; used by tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Value)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected observations in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.read().clone()
    }

    /// Returns just the observation names, in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Returns the data of every observation named `event_type`.
    #[must_use]
    pub fn events_named(&self, event_type: &str) -> Vec<Value> {
        self.events
            .read()
            .iter()
            .filter(|(name, _)| name == event_type)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Returns the number of collected observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected observations.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: Value) {
        self.events.write().push((event_type.to_string(), data));
    }
}
