//! Thread-safe in-memory automation rule repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::routing::domain::{AutomationRule, AutomationTrigger, RuleId};
use crate::routing::ports::{
    AutomationRuleRepository, RuleRepositoryError, RuleRepositoryResult,
};
use crate::task::domain::TenantId;

/// Thread-safe in-memory automation rule repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleRepository {
    state: Arc<RwLock<HashMap<RuleId, AutomationRule>>>,
}

impl InMemoryRuleRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(
        &self,
    ) -> RuleRepositoryResult<std::sync::RwLockReadGuard<'_, HashMap<RuleId, AutomationRule>>>
    {
        self.state.read().map_err(|err| {
            RuleRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(
        &self,
    ) -> RuleRepositoryResult<std::sync::RwLockWriteGuard<'_, HashMap<RuleId, AutomationRule>>>
    {
        self.state.write().map_err(|err| {
            RuleRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl AutomationRuleRepository for InMemoryRuleRepository {
    async fn insert(&self, rule: &AutomationRule) -> RuleRepositoryResult<()> {
        let mut state = self.write_state()?;
        if state.contains_key(&rule.id()) {
            return Err(RuleRepositoryError::DuplicateRule(rule.id()));
        }
        state.insert(rule.id(), rule.clone());
        Ok(())
    }

    async fn update(&self, rule: &AutomationRule) -> RuleRepositoryResult<()> {
        let mut state = self.write_state()?;
        if !state.contains_key(&rule.id()) {
            return Err(RuleRepositoryError::NotFound(rule.id()));
        }
        state.insert(rule.id(), rule.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant: TenantId,
        id: RuleId,
    ) -> RuleRepositoryResult<Option<AutomationRule>> {
        let state = self.read_state()?;
        Ok(state
            .get(&id)
            .filter(|rule| rule.tenant_id() == tenant)
            .cloned())
    }

    async fn list_for_trigger(
        &self,
        tenant: TenantId,
        trigger: AutomationTrigger,
    ) -> RuleRepositoryResult<Vec<AutomationRule>> {
        let state = self.read_state()?;
        let mut rules: Vec<AutomationRule> = state
            .values()
            .filter(|rule| rule.tenant_id() == tenant && rule.trigger() == trigger)
            .cloned()
            .collect();
        rules.sort_by_key(AutomationRule::id);
        Ok(rules)
    }
}
