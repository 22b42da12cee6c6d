//! Event sink for host lifecycle events
//!
//! Events are append-only and fire-and-forget: a failure to publish is
//! logged and never surfaces to the reconciler.

use crds::ByoHost;
use kube::{Client, Resource};
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::{debug, warn};

/// Kubernetes event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Progress or success
    Normal,
    /// Failure that the reconciler will report or retry
    Warning,
}

/// Trait for recording events against a host record
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Record an event; never fails
    async fn record(&self, host: &ByoHost, kind: EventKind, reason: &str, message: &str);
}

/// Event sink publishing `events.k8s.io` events
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    /// Create a new event sink reporting as `controller`
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEventSink {
    async fn record(&self, host: &ByoHost, kind: EventKind, reason: &str, message: &str) {
        let event = Event {
            type_: match kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        let reference = host.object_ref(&());
        match self.recorder.publish(&event, &reference).await {
            Ok(()) => debug!("Recorded {} event {}", reason, message),
            Err(e) => warn!("Failed to record {} event: {}", reason, e),
        }
    }
}
