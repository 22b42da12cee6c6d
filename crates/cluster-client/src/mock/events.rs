//! Recording event sink for tests

use super::lock;
use crate::events::{EventKind, EventSink};
use crds::ByoHost;
use std::sync::{Arc, Mutex};

/// One recorded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Normal or Warning
    pub kind: EventKind,
    /// Event reason
    pub reason: String,
    /// Event message
    pub message: String,
}

/// Event sink that keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MockEventSink {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MockEventSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events in order
    pub fn events(&self) -> Vec<RecordedEvent> {
        lock(&self.events).clone()
    }

    /// Recorded warning events in order
    pub fn warnings(&self) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == EventKind::Warning)
            .collect()
    }

    /// Reasons of all recorded events in order
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait::async_trait]
impl EventSink for MockEventSink {
    async fn record(&self, _host: &ByoHost, kind: EventKind, reason: &str, message: &str) {
        lock(&self.events).push(RecordedEvent {
            kind,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}
