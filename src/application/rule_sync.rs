use crate::domain::blocking::{plan_rule_update, RuleUpdate, DEFAULT_RULE_PRIORITY};
use crate::domain::models::FocusMode;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::Preferences;
use crate::infrastructure::rule_engine::RuleEngine;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSyncReport {
    pub mode: FocusMode,
    pub update: RuleUpdate,
}

impl RuleSyncReport {
    pub fn active_rule_count(&self) -> usize {
        self.update.add_rules.len()
    }
}

pub struct RuleSynchronizer<E>
where
    E: RuleEngine,
{
    engine: Arc<E>,
    preferences: Preferences,
    priority: u32,
}

impl<E> RuleSynchronizer<E>
where
    E: RuleEngine,
{
    pub fn new(engine: Arc<E>, preferences: Preferences) -> Self {
        Self {
            engine,
            preferences,
            priority: DEFAULT_RULE_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Replaces the whole dynamic rule set in one engine call.
    pub async fn sync(&self, mode: &FocusMode, blocklist: &[String]) -> Result<RuleSyncReport, InfraError> {
        let active = self.engine.dynamic_rule_ids().await?;
        let update = plan_rule_update(&active, mode, blocklist, self.priority);
        let report = RuleSyncReport {
            mode: mode.clone(),
            update: update.clone(),
        };
        if update.is_noop() {
            tracing::debug!(mode = %mode, "rule set already empty");
            return Ok(report);
        }

        if let Err(error) = self.engine.update_dynamic_rules(update).await {
            tracing::error!(mode = %mode, entries = blocklist.len(), %error, "rule replacement failed");
            return Err(error);
        }
        tracing::info!(
            mode = %mode,
            removed = report.update.remove_rule_ids.len(),
            added = report.active_rule_count(),
            "blocking rules replaced"
        );
        Ok(report)
    }

    pub async fn sync_from_store(&self) -> Result<RuleSyncReport, InfraError> {
        let mode = self.preferences.load_focus_mode()?;
        let blocklist = self.preferences.load_blocklist()?;
        self.sync(&mode, &blocklist).await
    }
}
