use crate::domain::blocking::RuleUpdate;
use crate::domain::models::BlockingRule;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// The browser's dynamic network-rule list.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, InfraError>;

    /// Applies removals and additions together; on error nothing changes.
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), InfraError>;
}

/// Keeps the active rule table in process. Validation mirrors what the browser
/// rejects so malformed filters surface as errors here too.
#[derive(Debug, Default)]
pub struct InMemoryRuleEngine {
    rules: Mutex<BTreeMap<u32, BlockingRule>>,
}

impl InMemoryRuleEngine {
    pub fn active_rules(&self) -> Result<Vec<BlockingRule>, InfraError> {
        let rules = self.lock()?;
        Ok(rules.values().cloned().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u32, BlockingRule>>, InfraError> {
        self.rules
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("rule table: {error}")))
    }
}

#[async_trait]
impl RuleEngine for InMemoryRuleEngine {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, InfraError> {
        let rules = self.lock()?;
        Ok(rules.keys().copied().collect())
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), InfraError> {
        for rule in &update.add_rules {
            rule.validate().map_err(InfraError::RuleUpdate)?;
        }

        let mut rules = self.lock()?;
        let mut next = rules.clone();
        for id in &update.remove_rule_ids {
            next.remove(id);
        }
        for rule in update.add_rules {
            if next.contains_key(&rule.id) {
                return Err(InfraError::RuleUpdate(format!(
                    "rule id {} is already in use",
                    rule.id
                )));
            }
            next.insert(rule.id, rule);
        }
        *rules = next;
        Ok(())
    }
}
