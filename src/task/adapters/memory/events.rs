//! In-memory audit-event sink.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::task::ports::{TaskEvent, TaskEventSink};

/// Collects audit events in memory for tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskEventSink {
    events: Arc<RwLock<Vec<TaskEvent>>>,
}

impl InMemoryTaskEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events in arrival order.
    #[must_use]
    pub fn recorded(&self) -> Vec<TaskEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskEventSink for InMemoryTaskEventSink {
    async fn record(&self, event: TaskEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}
