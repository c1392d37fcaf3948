//! Deduplication of the actions triggered by a rule set's passing rules.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::{Action, Policy, Rule, RuleEnvironment};

/// A passing rule that triggered an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingRule {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub version: String,
    pub policies: Vec<Policy>,
}

/// One distinct action and every rule in the set that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAction {
    pub action: Action,
    pub matching_rules: Vec<MatchingRule>,
    /// Union of the matching rules' policies, deduplicated by id.
    pub policies: Vec<Policy>,
    pub environment: RuleEnvironment,
}

impl TriggeredAction {
    pub fn action_id(&self) -> &str {
        &self.action.id
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.matching_rules.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Flatten and deduplicate the actions of `passing` rules by action id.
///
/// Pure: the output depends only on the passing rules and their lookups.
/// Rules are visited in id order, so the evaluation order of the set never
/// changes which rules are listed or in what order.
pub fn collect_triggered_actions(
    passing: &[(Arc<Rule>, Vec<Action>)],
    policies_by_rule: &HashMap<String, Vec<Policy>>,
    environment: RuleEnvironment,
) -> Vec<TriggeredAction> {
    let mut ordered: Vec<&(Arc<Rule>, Vec<Action>)> = passing.iter().collect();
    ordered.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let mut by_action: IndexMap<String, TriggeredAction> = IndexMap::new();

    for (rule, actions) in ordered {
        let rule_policies = policies_by_rule.get(&rule.id).cloned().unwrap_or_default();
        let matching = MatchingRule {
            id: rule.id.clone(),
            name: rule.name.clone(),
            tags: rule.tags.iter().cloned().collect(),
            version: rule.version.clone(),
            policies: rule_policies.clone(),
        };

        for action in actions {
            let entry = by_action
                .entry(action.id.clone())
                .or_insert_with(|| TriggeredAction {
                    action: action.clone(),
                    matching_rules: Vec::new(),
                    policies: Vec::new(),
                    environment,
                });

            // A rule listing the same action twice still matches once.
            if entry.matching_rules.iter().any(|r| r.id == matching.id) {
                continue;
            }
            entry.matching_rules.push(matching.clone());
            for policy in &rule_policies {
                if !entry.policies.iter().any(|p| p.id == policy.id) {
                    entry.policies.push(policy.clone());
                }
            }
        }
    }

    by_action.into_values().collect()
}
