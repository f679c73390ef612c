//! In-memory automation audit sink.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::routing::ports::{AutomationAuditSink, RuleEvaluation};

/// Collects rule evaluation records in memory for tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAutomationAuditSink {
    evaluations: Arc<RwLock<Vec<RuleEvaluation>>>,
}

impl InMemoryAutomationAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded evaluations in arrival order.
    #[must_use]
    pub fn recorded(&self) -> Vec<RuleEvaluation> {
        self.evaluations
            .read()
            .map(|evaluations| evaluations.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AutomationAuditSink for InMemoryAutomationAuditSink {
    async fn record(&self, evaluation: RuleEvaluation) {
        if let Ok(mut evaluations) = self.evaluations.write() {
            evaluations.push(evaluation);
        }
    }
}
