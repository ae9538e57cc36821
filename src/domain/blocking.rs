use crate::domain::models::{
    BlockEntry, BlockingRule, FocusMode, ResourceType, RuleAction, RuleActionType, RuleCondition,
};
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_RULE_PRIORITY: u32 = 1;

/// One atomic replacement of the dynamic rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<BlockingRule>,
}

impl RuleUpdate {
    pub fn is_noop(&self) -> bool {
        self.remove_rule_ids.is_empty() && self.add_rules.is_empty()
    }
}

pub fn derive_rules(mode: &FocusMode, blocklist: &[String], priority: u32) -> Vec<BlockingRule> {
    if !mode.blocks_sites() || blocklist.is_empty() {
        return Vec::new();
    }

    BlockEntry::from_blocklist(blocklist)
        .into_iter()
        .map(|entry| BlockingRule {
            id: entry.id,
            priority,
            action: RuleAction {
                action_type: RuleActionType::Block,
            },
            condition: RuleCondition {
                url_filter: entry.url_filter,
                resource_types: vec![ResourceType::MainFrame],
            },
        })
        .collect()
}

/// Removes every id that is active now plus the full `1..=N` range of the new
/// list, then adds the derived rules. Ids are never diffed.
pub fn plan_rule_update(
    active_rule_ids: &[u32],
    mode: &FocusMode,
    blocklist: &[String],
    priority: u32,
) -> RuleUpdate {
    let add_rules = derive_rules(mode, blocklist, priority);
    let mut remove = active_rule_ids.iter().copied().collect::<BTreeSet<_>>();
    remove.extend(1..=blocklist.len() as u32);

    RuleUpdate {
        remove_rule_ids: remove.into_iter().collect(),
        add_rules,
    }
}
