//! Repository ports for desks and automation rules.

use crate::routing::domain::{AutomationRule, AutomationTrigger, Desk, DeskId, RuleId};
use crate::task::domain::TenantId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for desk repository operations.
pub type DeskRepositoryResult<T> = Result<T, DeskRepositoryError>;

/// Desk persistence contract.
#[async_trait]
pub trait DeskRepository: Send + Sync {
    /// Stores a new desk.
    ///
    /// # Errors
    ///
    /// Returns [`DeskRepositoryError::DuplicateDesk`] when the desk ID
    /// already exists.
    async fn insert(&self, desk: &Desk) -> DeskRepositoryResult<()>;

    /// Persists changes to an existing desk.
    ///
    /// # Errors
    ///
    /// Returns [`DeskRepositoryError::NotFound`] when the desk does not
    /// exist.
    async fn update(&self, desk: &Desk) -> DeskRepositoryResult<()>;

    /// Finds a desk by identifier within a tenant.
    async fn find_by_id(&self, tenant: TenantId, id: DeskId)
    -> DeskRepositoryResult<Option<Desk>>;

    /// Returns a tenant's desks in evaluation order: priority descending,
    /// then id ascending for determinism.
    async fn list(&self, tenant: TenantId) -> DeskRepositoryResult<Vec<Desk>>;
}

/// Errors returned by desk repository implementations.
#[derive(Debug, Clone, Error)]
pub enum DeskRepositoryError {
    /// A desk with the same identifier already exists.
    #[error("duplicate desk identifier: {0}")]
    DuplicateDesk(DeskId),

    /// The desk was not found in the tenant.
    #[error("desk not found: {0}")]
    NotFound(DeskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl DeskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

/// Result type for automation rule repository operations.
pub type RuleRepositoryResult<T> = Result<T, RuleRepositoryError>;

/// Automation rule persistence contract.
#[async_trait]
pub trait AutomationRuleRepository: Send + Sync {
    /// Stores a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleRepositoryError::DuplicateRule`] when the rule ID
    /// already exists.
    async fn insert(&self, rule: &AutomationRule) -> RuleRepositoryResult<()>;

    /// Persists changes to an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleRepositoryError::NotFound`] when the rule does not
    /// exist.
    async fn update(&self, rule: &AutomationRule) -> RuleRepositoryResult<()>;

    /// Finds a rule by identifier within a tenant.
    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: RuleId,
    ) -> RuleRepositoryResult<Option<AutomationRule>>;

    /// Returns a tenant's rules for the given trigger, sorted by id for
    /// a stable evaluation order.
    async fn list_for_trigger(
        &self,
        tenant: TenantId,
        trigger: AutomationTrigger,
    ) -> RuleRepositoryResult<Vec<AutomationRule>>;
}

/// Errors returned by automation rule repository implementations.
#[derive(Debug, Clone, Error)]
pub enum RuleRepositoryError {
    /// A rule with the same identifier already exists.
    #[error("duplicate automation rule identifier: {0}")]
    DuplicateRule(RuleId),

    /// The rule was not found in the tenant.
    #[error("automation rule not found: {0}")]
    NotFound(RuleId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RuleRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
