//! Trigger-driven automation with staged rollout gating.
//!
//! When a lifecycle trigger fires for a work item, every rule registered for
//! that trigger is evaluated. Matching evaluations are recorded through the
//! audit sink whatever the rollout stage; only `full` rules and in-bucket
//! `partial` rules execute their action. Shadow rules therefore have exactly
//! one observable effect: the audit record.

use crate::routing::domain::{
    AutomationAction, AutomationRule, AutomationTrigger, RuleDecision,
};
use crate::routing::ports::{
    AutomationAuditSink, AutomationRuleRepository, DeskRepository, DeskRepositoryError,
    RuleDisposition, RuleEvaluation, RuleRepositoryError,
};
use crate::task::domain::{Task, TaskId, TenantId};
use crate::task::ports::{TaskRepository, TaskRepositoryError};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Service-level errors for automation evaluation.
#[derive(Debug, Error)]
pub enum AutomationServiceError {
    /// Rule repository operation failed.
    #[error(transparent)]
    Rules(#[from] RuleRepositoryError),

    /// Desk repository operation failed while executing an action.
    #[error(transparent)]
    Desk(#[from] DeskRepositoryError),

    /// Task repository operation failed.
    #[error(transparent)]
    Task(#[from] TaskRepositoryError),

    /// The triggering work item was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Result type for automation operations.
pub type AutomationResult<T> = Result<T, AutomationServiceError>;

/// Summary of one trigger firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerOutcome {
    /// Rules whose conditions all matched.
    pub matched: usize,
    /// Matching rules whose action executed.
    pub executed: usize,
}

/// Evaluates automation rules when lifecycle triggers fire.
pub struct AutomationService<R, D, T, A, C>
where
    R: AutomationRuleRepository,
    D: DeskRepository,
    T: TaskRepository,
    A: AutomationAuditSink,
    C: Clock + Send + Sync,
{
    rules: Arc<R>,
    desks: Arc<D>,
    tasks: Arc<T>,
    audit: Arc<A>,
    clock: Arc<C>,
}

// Handles share state through the inner `Arc`s, so cloning must not demand
// `Clone` of the collaborators themselves.
impl<R, D, T, A, C> Clone for AutomationService<R, D, T, A, C>
where
    R: AutomationRuleRepository,
    D: DeskRepository,
    T: TaskRepository,
    A: AutomationAuditSink,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
            desks: Arc::clone(&self.desks),
            tasks: Arc::clone(&self.tasks),
            audit: Arc::clone(&self.audit),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R, D, T, A, C> AutomationService<R, D, T, A, C>
where
    R: AutomationRuleRepository,
    D: DeskRepository,
    T: TaskRepository,
    A: AutomationAuditSink,
    C: Clock + Send + Sync,
{
    /// Creates a new automation service.
    #[must_use]
    pub const fn new(
        rules: Arc<R>,
        desks: Arc<D>,
        tasks: Arc<T>,
        audit: Arc<A>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            rules,
            desks,
            tasks,
            audit,
            clock,
        }
    }

    /// Fires a trigger for a work item: evaluates every registered rule,
    /// records matching evaluations, and executes permitted actions.
    ///
    /// All executed actions are folded into a single conditional write; a
    /// lost update race is logged and dropped rather than surfaced, since the
    /// item has already moved on under a competing caller.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationServiceError::TaskNotFound`] when the item does
    /// not exist in the tenant, and repository errors otherwise.
    pub async fn fire(
        &self,
        tenant: TenantId,
        trigger: AutomationTrigger,
        task_id: TaskId,
    ) -> AutomationResult<TriggerOutcome> {
        let task = self
            .tasks
            .find_by_id(tenant, task_id)
            .await?
            .ok_or(AutomationServiceError::TaskNotFound(task_id))?;
        let rules = self.rules.list_for_trigger(tenant, trigger).await?;

        let mut outcome = TriggerOutcome::default();
        let mut working = task;
        let mut dirty = false;
        for rule in &rules {
            let decision = rule.evaluate(&working);
            self.record_decision(rule, &working, &decision).await;
            match decision {
                RuleDecision::Off | RuleDecision::NotMatched => {}
                RuleDecision::Shadowed { .. } | RuleDecision::SkippedBucket { .. } => {
                    outcome.matched += 1;
                }
                RuleDecision::Execute { .. } => {
                    outcome.matched += 1;
                    self.apply_action(rule.action(), &mut working).await?;
                    outcome.executed += 1;
                    dirty = true;
                }
            }
        }

        if dirty {
            match self.tasks.update(&working).await {
                Ok(_) => {}
                Err(err) if err.is_conflict() => {
                    warn!(task = %task_id, "dropping automation actions: item updated concurrently");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(outcome)
    }

    async fn record_decision(&self, rule: &AutomationRule, task: &Task, decision: &RuleDecision) {
        let Some(disposition) = RuleDisposition::from_decision(decision) else {
            return;
        };
        let matched_conditions = match decision {
            RuleDecision::Shadowed { matched_conditions }
            | RuleDecision::Execute { matched_conditions } => matched_conditions.clone(),
            RuleDecision::SkippedBucket { .. } => (0..rule.conditions().len()).collect(),
            RuleDecision::Off | RuleDecision::NotMatched => Vec::new(),
        };
        self.audit
            .record(RuleEvaluation::new(
                rule.tenant_id(),
                rule.id(),
                rule.name(),
                task.id(),
                matched_conditions,
                disposition,
                &*self.clock,
            ))
            .await;
    }

    async fn apply_action(
        &self,
        action: &AutomationAction,
        task: &mut Task,
    ) -> AutomationResult<()> {
        match action {
            AutomationAction::AssignDesk(desk_id) => {
                let Some(desk) = self.desks.find_by_id(task.tenant_id(), *desk_id).await? else {
                    debug!(desk = %desk_id, "assign-desk action names a missing desk; skipping");
                    return Ok(());
                };
                task.route_to(desk.id(), desk.queue_id(), &*self.clock);
            }
            AutomationAction::SetPriority(priority) => {
                task.set_priority(*priority, &*self.clock);
            }
            AutomationAction::AddTag(tag) => task.add_tag(tag.clone(), &*self.clock),
        }
        Ok(())
    }
}
